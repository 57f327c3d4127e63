use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt as _;
use kdam::{tqdm, BarExt as _};

use manga_vaani::logging::{self, LogTarget};
use manga_vaani::requests::manga::ListKind;
use manga_vaani::requests::Result;
use manga_vaani::{images, VaaniClient};

use std::path::PathBuf;

/// Diagnostics for the MangaVaani backend connection
#[derive(Parser)]
#[command(name = "manga-vaani")]
#[command(about = "Talks to the MangaVaani backend the same way the app does", long_about = None)]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Shelf {
    Popular,
    Recent,
    Default,
}

impl From<Shelf> for ListKind {
    fn from(shelf: Shelf) -> Self {
        match shelf {
            Shelf::Popular => ListKind::Popular,
            Shelf::Recent => ListKind::Recent,
            Shelf::Default => ListKind::Default,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fallbacks the reader would try for an image url
    Fallback {
        url: String,
        #[arg(long)]
        data_saver: bool,
    },
    #[command(flatten)]
    Backend(BackendCommand),
}

/// Commands that talk to the backend
#[derive(Subcommand)]
enum BackendCommand {
    /// Probe the backend, walking the endpoint list until one answers
    Status,
    /// List manga
    List {
        #[arg(short, long, value_enum)]
        kind: Option<Shelf>,
    },
    /// Show one manga
    Details { id: String },
    /// List the chapters of a manga
    Chapters { id: String },
    /// List the page images of a chapter
    Images { chapter_id: String },
    /// Search manga by title
    Search {
        query: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Download every page of a chapter
    Download {
        chapter_id: String,
        #[arg(short, long)]
        out: PathBuf,
        /// Retry failed pages on the data-saver tier
        #[arg(long)]
        data_saver: bool,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = logging::init(match cli.log_file {
        Some(path) => LogTarget::File(path),
        None => LogTarget::Stderr,
    })?;

    match cli.command {
        Commands::Fallback { url, data_saver } => {
            for step in images::fallback_chain(&url, data_saver) {
                println!("{step}");
            }

            Ok(())
        }
        Commands::Backend(command) => run(&VaaniClient::new()?, command).await,
    }
}

async fn run(client: &VaaniClient, command: BackendCommand) -> Result<()> {
    match command {
        BackendCommand::Status => {
            let reachable = client.check_status().await;
            let endpoint = client.pool().current();

            if reachable {
                println!("connected via {endpoint}");
            } else {
                println!("cannot connect, tried {:?}", client.pool().endpoints());
            }
        }
        BackendCommand::List { kind } => {
            for manga in client.list_manga(kind.map(ListKind::from)).await? {
                println!("{}\t{}\t{}", manga.id, manga.title, manga.chapter_label);
            }
        }
        BackendCommand::Details { id } => {
            let detail = client.get_manga_details(&id).await?;
            println!("{detail:#?}");
        }
        BackendCommand::Chapters { id } => {
            for chapter in client.get_manga_chapters(&id).await? {
                println!(
                    "{:>8}\t{}\t{}\t{}",
                    chapter.number, chapter.id, chapter.title, chapter.publish_date
                );
            }
        }
        BackendCommand::Images { chapter_id } => {
            let set = client.get_chapter_images(&chapter_id).await?;
            for (i, url) in set.images().iter().enumerate() {
                println!("{:>3}\t{url}", i + 1);
            }
        }
        BackendCommand::Search { query, page } => {
            let res = client.search_manga(&query, page).await?;

            println!("page {} ({} results in total)", res.page, res.total);
            for manga in &res.results {
                println!("{}\t{}", manga.id, manga.title);
            }
        }
        BackendCommand::Download {
            chapter_id,
            out,
            data_saver,
            concurrency,
        } => {
            let set = client.get_chapter_images(&chapter_id).await?;
            tokio::fs::create_dir_all(&out).await?;

            let mut pb = tqdm!(total = set.page_count());

            let mut downloads = futures::stream::iter(set.images().iter().enumerate())
                .map(|(i, url)| async move {
                    (i + 1, url, client.download_page(url, data_saver).await)
                })
                .buffer_unordered(concurrency.max(1));

            let mut failed = 0;
            while let Some((page, url, res)) = downloads.next().await {
                match res {
                    Ok(bytes) => {
                        let path = out.join(format!("{page:03}.{}", extension(url)));
                        tokio::fs::write(path, bytes).await?;
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(page, "page could not be downloaded: {e}");
                    }
                }

                pb.update(1)?;
            }

            eprintln!();
            println!(
                "saved {} of {} pages to {}",
                set.page_count() - failed,
                set.page_count(),
                out.display()
            );
        }
    }

    Ok(())
}

fn extension(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 4)
        .unwrap_or("png")
}
