//! Booksum - 书籍摘要客户端
//!
//! 命令行入口：
//! - books / show / status: 查询书籍与处理状态
//! - upload / delete: 上传与删除书籍
//! - watch: 轮询状态直到所有章节完成
//! - summary: 加载摘要树并按需展开
//! - retry / resummarize: 章节重试与重新生成

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;

use booksum::application::{
    BookApiPort, BookListViewModel, BookStatusResponse, DeleteBook, DeleteBookHandler, ExpandOutcome, GetBook,
    GetBookHandler, GetBookStatus, GetBookStatusHandler, GetNonChapters, GetNonChaptersHandler, PollPhase, ResummarizeChapter, ResummarizeChapterHandler, RetryChapter, RetryChapterHandler,
    StatusStorePort, SummaryTreeViewModel, UploadBook, UploadBookHandler,
};
use booksum::config::{load_config, load_config_from_path, print_config, AppConfig};
use booksum::domain::book::{Book, UploadFile};
use booksum::domain::summary::RenderedSection;
use booksum::infrastructure::adapters::{HttpBookApi, HttpBookApiConfig};
use booksum::infrastructure::events::{ClientEvent, EventPublisher};
use booksum::infrastructure::memory::{InMemoryStatusStore, InMemorySummaryCache};
use booksum::infrastructure::worker::{StatusPollerConfig, StatusPollerRegistry};

#[derive(Debug, Parser)]
#[command(name = "booksum", version, about = "Client for the book summarization service")]
struct Cli {
    /// 配置文件路径（默认搜索 config.toml / config.local.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List uploaded books
    Books,
    /// Show a book and its chapter status
    Show { book_id: String },
    /// Upload a PDF/EPUB/MOBI file
    Upload {
        path: PathBuf,
        /// Poll status until all chapters are processed
        #[arg(long)]
        watch: bool,
    },
    /// Delete a book
    Delete { book_id: String },
    /// Fetch the current processing status
    Status { book_id: String },
    /// Poll status until all chapters are processed
    Watch { book_id: String },
    /// Print the summary tree, expanding the given sections
    Summary {
        book_id: String,
        /// Section ids to expand (applied level by level)
        #[arg(long = "expand", short = 'e')]
        expand: Vec<String>,
        /// Print the rendered rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retry a failed chapter
    Retry {
        book_id: String,
        chapter_id: String,
        #[arg(long)]
        watch: bool,
    },
    /// Delete a chapter's summaries and regenerate them
    Resummarize {
        book_id: String,
        chapter_id: String,
        #[arg(long)]
        watch: bool,
    },
}

/// 组装好的依赖
struct App {
    config: AppConfig,
    api: Arc<dyn BookApiPort>,
    cache: Arc<InMemorySummaryCache>,
    status_store: Arc<InMemoryStatusStore>,
    event_publisher: Arc<EventPublisher>,
    pollers: Arc<StatusPollerRegistry>,
    book_list: BookListViewModel,
}

impl App {
    fn new(config: AppConfig) -> anyhow::Result<Self> {
        let api_config = HttpBookApiConfig::new(&config.api.url).with_timeout(config.api.timeout_secs);
        let api: Arc<dyn BookApiPort> = Arc::new(HttpBookApi::new(api_config)?);
        let cache = Arc::new(InMemorySummaryCache::with_ttl(config.cache.ttl()));
        let status_store = Arc::new(InMemoryStatusStore::new());
        let event_publisher = Arc::new(EventPublisher::new());
        let pollers = Arc::new(StatusPollerRegistry::new(
            StatusPollerConfig {
                interval: config.poll.interval(),
            },
            api.clone(),
            status_store.clone(),
            event_publisher.clone(),
        ));

        let book_list = BookListViewModel::new(api.clone());

        Ok(Self {
            config,
            book_list,
            api,
            cache,
            status_store,
            event_publisher,
            pollers,
        })
    }

    async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Books => self.books().await,
            Command::Show { book_id } => self.show(&book_id).await,
            Command::Upload { path, watch } => {
                let book_id = self.upload(&path).await?;
                if watch {
                    self.watch(&book_id).await?;
                }
                Ok(())
            }
            Command::Delete { book_id } => {
                DeleteBookHandler::new(self.api.clone(), self.status_store.clone(), self.event_publisher.clone())
                    .handle(DeleteBook { book_id: book_id.clone() })
                    .await?;
                self.book_list.remove(&book_id);
                println!("Deleted {}", book_id);
                Ok(())
            }
            Command::Status { book_id } => {
                let status = self.status(&book_id).await?;
                print_status(&status);
                Ok(())
            }
            Command::Watch { book_id } => self.watch(&book_id).await,
            Command::Summary { book_id, expand, json } => self.summary(&book_id, &expand, json).await,
            Command::Retry {
                book_id,
                chapter_id,
                watch,
            } => {
                // 先启动轮询器，重试成功后由命令恢复轮询
                if watch {
                    self.pollers.watch(&book_id);
                }
                let response = RetryChapterHandler::new(
                    self.api.clone(),
                    self.status_store.clone(),
                    self.pollers.clone(),
                    self.event_publisher.clone(),
                )
                .handle(RetryChapter {
                    book_id: book_id.clone(),
                    chapter_id: chapter_id.clone(),
                })
                .await?;
                println!("Chapter {} {}", chapter_id, response.status);
                if watch {
                    self.watch(&book_id).await?;
                }
                Ok(())
            }
            Command::Resummarize {
                book_id,
                chapter_id,
                watch,
            } => {
                if watch {
                    self.pollers.watch(&book_id);
                }
                let response = ResummarizeChapterHandler::new(
                    self.api.clone(),
                    self.cache.clone(),
                    self.status_store.clone(),
                    self.pollers.clone(),
                    self.event_publisher.clone(),
                )
                .handle(ResummarizeChapter {
                    book_id: book_id.clone(),
                    chapter_id,
                })
                .await?;
                println!("{}", response.message);
                if watch {
                    self.watch(&book_id).await?;
                }
                Ok(())
            }
        }
    }

    async fn books(&self) -> anyhow::Result<()> {
        if let Err(e) = self.book_list.refresh().await {
            let message = self.book_list.error().unwrap_or_else(|| e.to_string());
            anyhow::bail!(message);
        }
        let books = self.book_list.books();
        if books.is_empty() {
            println!("No books uploaded");
        }
        for book in books {
            println!(
                "{}\t{}\t{}",
                book.id,
                book.title,
                book.uploaded_at.as_deref().unwrap_or("-")
            );
        }
        Ok(())
    }

    async fn show(&self, book_id: &str) -> anyhow::Result<()> {
        let book = GetBookHandler::new(self.api.clone())
            .handle(GetBook {
                book_id: book_id.to_string(),
            })
            .await?;
        println!("{} ({})", book.title, book.id);

        let status = self.status(book_id).await?;
        print_status(&status);
        Ok(())
    }

    async fn status(&self, book_id: &str) -> anyhow::Result<BookStatusResponse> {
        // non-chapter 列表失败不影响状态展示
        if let Err(e) = GetNonChaptersHandler::new(self.api.clone(), self.status_store.clone())
            .handle(GetNonChapters {
                book_id: book_id.to_string(),
            })
            .await
        {
            tracing::warn!(book_id = %book_id, error = %e, "Non-chapters unavailable");
        }

        let status = GetBookStatusHandler::new(self.api.clone(), self.status_store.clone())
            .handle(GetBookStatus {
                book_id: book_id.to_string(),
                force_refresh: true,
            })
            .await?;
        Ok(status)
    }

    async fn upload(&self, path: &std::path::Path) -> anyhow::Result<String> {
        let file = UploadFile::from_path(path).await?;
        let response = UploadBookHandler::new(
            self.api.clone(),
            self.config.upload.policy(),
            self.event_publisher.clone(),
        )
        .handle(UploadBook { file })
        .await?;

        println!("Uploaded \"{}\" as {}", response.title, response.book_id);
        self.book_list.add(Book {
            id: response.book_id.clone(),
            title: response.title.clone(),
            uploaded_at: None,
        });
        for (index, chapter) in response.metadata.chapters.iter().enumerate() {
            println!("  {:>3}. {}", index + 1, chapter.title);
        }
        Ok(response.book_id)
    }

    /// 轮询直到 settled 或收到 ctrl-c
    async fn watch(&self, book_id: &str) -> anyhow::Result<()> {
        let mut events = self.event_publisher.subscribe_book(book_id);
        let handle = self.pollers.watch(book_id);
        // 已经 settled 的轮询器（如 retry 之前启动的）不会再发阶段事件
        if handle.phase() == PollPhase::Settled && !self.status_store.get(book_id).is_some_and(|s| s.stale) {
            println!("All chapters processed");
            return Ok(());
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ClientEvent::StatusUpdated { completed_chapters, total_chapters, .. }) => {
                        let progress = self
                            .status_store
                            .get(book_id)
                            .and_then(|s| s.progress())
                            .unwrap_or((completed_chapters, total_chapters));
                        println!("{}/{} chapters processed", progress.0, progress.1);
                    }
                    Ok(ClientEvent::StatusFailed { error, .. }) => eprintln!("{}", error),
                    Ok(ClientEvent::PollPhaseChanged { phase: PollPhase::Settled, .. }) => break,
                    Ok(ClientEvent::PollPhaseChanged { phase: PollPhase::Idle, .. }) => break,
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped = skipped, "Watch lagged behind events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.pollers.stop_all();
        if let Some(snapshot) = self.status_store.get(book_id) {
            if let Some(status) = snapshot.status {
                for chapter in status.chapters.iter().filter(|c| c.error.is_some()) {
                    println!(
                        "  {} failed: {}",
                        chapter.id,
                        chapter.error.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        Ok(())
    }

    async fn summary(&self, book_id: &str, expand: &[String], json: bool) -> anyhow::Result<()> {
        let book = GetBookHandler::new(self.api.clone())
            .handle(GetBook {
                book_id: book_id.to_string(),
            })
            .await?;
        let view_model = SummaryTreeViewModel::new(book_id, book.title, self.cache.clone(), self.api.clone())
            .with_events(self.event_publisher.clone())
            .with_max_depth(self.config.summary.max_depth);
        view_model.load_root().await?;

        // 每一轮展开当前已出现的节点，不同节点并发请求
        let mut pending: Vec<&String> = expand.iter().collect();
        while !pending.is_empty() {
            let (ready, waiting): (Vec<&String>, Vec<&String>) = pending
                .into_iter()
                .partition(|id| view_model.section(id).is_some());
            if ready.is_empty() {
                for id in &waiting {
                    eprintln!("Section not found: {}", id);
                }
                break;
            }

            let results = join_all(ready.iter().map(|id| view_model.expand(id))).await;
            for (id, result) in ready.iter().zip(results) {
                match result {
                    Ok(ExpandOutcome::AtMaxDepth) => eprintln!("{} is already at maximum detail", id),
                    Ok(_) => {}
                    Err(e) => eprintln!("{}: {}", id, e),
                }
            }
            pending = waiting;
        }

        let rows = view_model.snapshot();
        if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            print_tree(&rows);
        }
        Ok(())
    }
}

fn print_status(status: &BookStatusResponse) {
    println!("{}/{} chapters processed", status.completed, status.total);
    for chapter in &status.status.chapters {
        match &chapter.error {
            Some(error) => println!("  [{}] {} {}: {}", chapter.status, chapter.id, chapter.title, error),
            None => println!("  [{}] {} {}", chapter.status, chapter.id, chapter.title),
        }
    }
}

fn print_tree(rows: &[RenderedSection]) {
    for row in rows {
        let indent = "  ".repeat(row.level);
        let marker = match (row.is_expanded, row.has_children) {
            (true, _) => "-",
            (false, true) => "+",
            (false, false) => "*",
        };
        println!("{}{} {} [{}] (depth {})", indent, marker, row.title, row.id, row.depth);
        if row.is_expanded && !row.content.is_empty() {
            for line in row.content.lines() {
                println!("{}    {}", indent, line);
            }
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},booksum={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    // 标准输出留给命令结果
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = match &cli.config {
        Some(path) => load_config_from_path(Some(path)),
        None => load_config(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    print_config(&config);

    let app = App::new(config)?;
    app.run(cli.command).await
}
