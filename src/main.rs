use anyhow::Context;
use clap::Parser;
use listfetch::{FetchRequest, ListClient, Record, RecordSink, Result as FetchResult, SessionConfig, SinkFlow};
use std::time::Duration;
use uuid::Uuid;

/// Fetch records from a remote list store, riding out query-cost
/// throttling transparently.
#[derive(Parser, Debug)]
#[command(name = "listfetch", version, about)]
struct Args {
    /// Base URL of the store site
    #[arg(long)]
    site: String,

    /// List to read from
    #[arg(long)]
    list: String,

    /// Fetch a single item by its indexed key
    #[arg(long, conflicts_with_all = ["unique_id", "query"])]
    id: Option<i64>,

    /// Fetch a single item by its unique identifier
    #[arg(long, conflicts_with = "query")]
    unique_id: Option<Uuid>,

    /// Opaque view markup to execute instead of fetching all records
    #[arg(long)]
    query: Option<String>,

    /// Comma-separated field names to project
    #[arg(long, value_delimiter = ',')]
    fields: Option<Vec<String>>,

    /// Records per page (and window span under throttling)
    #[arg(long)]
    page_size: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

/// Prints each record as one JSON line, as pages arrive.
struct JsonLineSink {
    printed: usize,
}

impl RecordSink for JsonLineSink {
    fn accept(&mut self, records: Vec<Record>) -> FetchResult<SinkFlow> {
        for record in &records {
            println!("{}", record.to_json());
        }
        self.printed += records.len();
        Ok(SinkFlow::Continue)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = SessionConfig::new(&args.site).request_timeout(Duration::from_secs(args.timeout));
    let client = ListClient::with_config(config).context("failed to open the store session")?;

    if let Some(id) = args.id {
        let item = client.get_item(&args.list, id).await?;
        println!("{}", item.to_json());
        return Ok(());
    }
    if let Some(unique_id) = args.unique_id {
        let item = client.get_item_by_unique_id(&args.list, unique_id).await?;
        println!("{}", item.to_json());
        return Ok(());
    }

    let mut request = FetchRequest::new();
    if let Some(query) = &args.query {
        request = request.query(query);
    }
    if let Some(fields) = &args.fields {
        let names: Vec<&str> = fields.iter().map(String::as_str).collect();
        request = request.fields(&names);
    }
    if let Some(page_size) = args.page_size {
        request = request.page_size(page_size);
    }

    let mut sink = JsonLineSink { printed: 0 };
    client.stream_items(&args.list, &request, &mut sink).await?;
    eprintln!("{} record(s)", sink.printed);
    Ok(())
}
