use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(about = "Command-line client for the blob portal", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check portal liveness
    Health,
    /// List blobs in the container
    List {
        /// Only blobs whose names start with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Upload a file
    Upload {
        /// File to upload
        file: PathBuf,

        /// Blob name; defaults to the file's name
        #[arg(short, long)]
        name: Option<String>,

        /// Content type; defaults to application/octet-stream
        #[arg(short, long)]
        content_type: Option<String>,
    },
    /// Download a blob
    Download {
        /// Blob name
        name: String,

        /// Output path; defaults to the blob's file name
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a blob
    Delete {
        /// Blob name
        name: String,
    },
    /// Create the configured container
    CreateContainer,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::List { prefix } => {
            let mut request = client.get(format!("{}/api/blobs", cli.url));
            if let Some(prefix) = prefix {
                request = request.query(&[("prefix", prefix)]);
            }
            let res = request.send().await?;
            print_response(res).await?;
        }
        Commands::Upload {
            file,
            name,
            content_type,
        } => {
            let data = tokio::fs::read(&file).await?;
            let blob_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or("cannot derive a blob name from the file path")?,
            };

            let mut part = reqwest::multipart::Part::bytes(data).file_name(blob_name);
            if let Some(content_type) = content_type {
                part = part.mime_str(&content_type)?;
            }
            let form = reqwest::multipart::Form::new().part("file", part);

            let res = client
                .post(format!("{}/api/blobs", cli.url))
                .multipart(form)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Download { name, output } => {
            let res = client.get(blob_url(&cli.url, &name)?).send().await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: portal returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                return Ok(());
            }

            let output = output.unwrap_or_else(|| {
                PathBuf::from(name.rsplit('/').next().unwrap_or(name.as_str()))
            });
            let bytes = res.bytes().await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
        }
        Commands::Delete { name } => {
            let res = client.delete(blob_url(&cli.url, &name)?).send().await?;
            if res.status() == reqwest::StatusCode::NO_CONTENT {
                println!("Deleted {}", name);
            } else {
                print_response(res).await?;
            }
        }
        Commands::CreateContainer => {
            let res = client
                .post(format!("{}/api/container", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn blob_url(base: &str, name: &str) -> Result<reqwest::Url, Box<dyn std::error::Error>> {
    let mut url = reqwest::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| "portal URL cannot carry a path")?
        .pop_if_empty()
        .extend(["api", "blobs"])
        .extend(name.split('/'));
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: portal returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
