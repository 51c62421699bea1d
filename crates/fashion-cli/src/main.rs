use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fashion_composer::images::sniff_mime;
use fashion_composer::{
    ACCESS_TOKEN_KEY, Attachment, AuthContext, BoardApi, Category, Composer, Config, FileStore,
    FileTokenStore, HtmlEditor, HttpBoardClient, ImageUpload, PickedImage, RichTextEditor,
    TokenStore,
};
use miette::{IntoDiagnostic, Result};

mod terminal;

use terminal::TerminalPresenter;

#[derive(Parser)]
#[command(version, about = "Compose and post questions to the fashion Q&A board", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON config file. Without one, FASHION_* environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the token store file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write and submit a question
    Submit {
        #[arg(long, default_value = "")]
        title: String,

        /// Board to post on: product or other
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,

        /// Body text. Each line becomes its own paragraph.
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the body text from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Image file to embed at the end of the body (repeatable)
        #[arg(long = "image")]
        images: Vec<PathBuf>,

        /// Remote image to embed by URL (repeatable)
        #[arg(long = "image-url")]
        image_urls: Vec<String>,

        /// File to attach (repeatable)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Upload an image and print the URL it is served from
    UploadImage { path: PathBuf },
    /// Manage the stored access token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a bearer token for later requests
    Set { token: String },
    /// Forget the stored token
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = FileTokenStore::new(match cli.store {
        Some(path) => path,
        None => default_store_path()?,
    });

    match cli.command {
        Commands::Submit {
            title,
            category,
            body,
            body_file,
            images,
            image_urls,
            attachments,
        } => {
            let body = match body_file {
                Some(path) => std::fs::read_to_string(&path).into_diagnostic()?,
                None => body.unwrap_or_default(),
            };
            let config = load_config(cli.config.as_deref()).await?;
            let auth = AuthContext::from_store(&store)?;
            let draft = Draft {
                title,
                category,
                body,
                images,
                image_urls,
                attachments,
            };
            submit(config, auth, draft).await?;
        }
        Commands::UploadImage { path } => {
            let config = load_config(cli.config.as_deref()).await?;
            let auth = AuthContext::from_store(&store)?;
            upload_image(config, auth, &path).await?;
        }
        Commands::Token { action } => match action {
            TokenAction::Set { token } => {
                store.set(ACCESS_TOKEN_KEY, &token)?;
                eprintln!("Token saved to: {}", store.path().display());
            }
            TokenAction::Clear => {
                store.remove(ACCESS_TOKEN_KEY)?;
                eprintln!("Token removed from: {}", store.path().display());
            }
        },
    }

    Ok(())
}

struct Draft {
    title: String,
    category: Option<Category>,
    body: String,
    images: Vec<PathBuf>,
    image_urls: Vec<String>,
    attachments: Vec<PathBuf>,
}

async fn submit(config: Config, auth: AuthContext, draft: Draft) -> Result<()> {
    let client = HttpBoardClient::new(config.clone());
    let mut composer = Composer::new(
        config,
        HtmlEditor::with_text(&draft.body),
        client,
        TerminalPresenter,
    );
    composer.set_title(draft.title);
    composer.set_category(draft.category);

    for path in &draft.images {
        let image = PickedImage::new(file_name(path), read_file(path)?);
        let src = composer.insert_image(image, &auth).await?;
        tracing::info!(%src, "embedded {}", path.display());
    }
    for url in &draft.image_urls {
        let editor = composer.editor_mut();
        let end = editor.len();
        editor.insert_image(end, url);
    }

    let files = draft
        .attachments
        .iter()
        .map(|path| -> Result<Attachment> {
            Ok(Attachment::new(file_name(path), read_file(path)?))
        })
        .collect::<Result<Vec<_>>>()?;
    composer.attach_files(files);

    let receipt = composer.submit(&auth).await?;
    tracing::debug!(response = %receipt.response, "server response");
    Ok(())
}

async fn upload_image(config: Config, auth: AuthContext, path: &Path) -> Result<()> {
    let data = read_file(path)?;
    let client = HttpBoardClient::new(config);
    let upload = ImageUpload {
        file_name: file_name(path),
        mime_type: sniff_mime(&data),
        data,
    };
    let image_url = client.upload_image(upload, &auth).await?;
    println!("{}", client.config().asset_link(&image_url));
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(&FileStore::new(path)).await?,
        None => Config::from_env()?,
    };
    tracing::debug!(api_url = %config.api_url, "loaded config");
    Ok(config)
}

fn parse_category(value: &str) -> std::result::Result<Category, String> {
    Category::parse(value)
        .ok_or_else(|| format!("unknown category `{value}`, expected product or other"))
}

fn read_file(path: &Path) -> Result<bytes::Bytes> {
    std::fs::read(path)
        .map(bytes::Bytes::from)
        .into_diagnostic()
        .map_err(|e| e.wrap_err(format!("reading {}", path.display())))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn default_store_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("fashion").join("storage.json"))
        .ok_or_else(|| miette::miette!("could not determine config directory, pass --store"))
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
