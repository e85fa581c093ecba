//! Multi-file upload example
//!
//! Uploads every path given on the command line to one endpoint, two files at a
//! time, printing events until the batch is done.
//!
//! ```bash
//! cargo run --example upload_files -- https://upload.example.com/videos/abc123 a.mp4 b.mp4
//! ```

use chunk_uploader::{Config, Event, UploadFile, Uploader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(endpoint) = args.next() else {
        eprintln!("usage: upload_files <endpoint> <file>...");
        std::process::exit(2);
    };

    let mut config = Config::default();
    config.upload.endpoint = Some(endpoint);
    config.upload.dynamic_chunk_size = true;
    config.queue.multiple = true;
    config.queue.max_concurrent_uploads = 2;

    let uploader = Uploader::new(config)?;
    let mut events = uploader.subscribe();

    let mut files = Vec::new();
    for path in args {
        files.push(UploadFile::from_path(&path).await?);
    }
    if files.is_empty() {
        println!("Nothing to upload");
        return Ok(());
    }
    uploader.enqueue(files).await;

    while let Ok(event) = events.recv().await {
        match event {
            Event::QueueStarted { files } => {
                println!("Batch started with {} files", files.len());
            }
            Event::UploadStart { file, chunk_size } => {
                println!("↑ {} ({} bytes, {} byte chunks)", file.name, file.size, chunk_size);
            }
            Event::Progress { file, percent } => {
                println!("  {}: {:.1}%", file.name, percent);
            }
            Event::ChunkSuccess {
                file,
                chunk,
                attempts,
                time_interval_ms,
                ..
            } if attempts > 1 => {
                println!(
                    "  {}: chunk {} took {} attempts ({} ms)",
                    file.name, chunk, attempts, time_interval_ms
                );
            }
            Event::Offline { file } => {
                println!("  {}: offline, retrying within the retry budget", file.name);
            }
            Event::Online { file } => println!("  {}: back online", file.name),
            Event::Success { file } => println!("✓ {}", file.name),
            Event::UploadError { file, message, .. } => {
                println!("✗ {}: {}", file.name, message);
            }
            Event::QueueComplete => break,
            _ => {}
        }
    }

    let stats = uploader.stats().await;
    println!(
        "Done: {} uploaded, {} failed",
        stats.completed, stats.errored
    );
    Ok(())
}
