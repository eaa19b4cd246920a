use clap::{Parser, Subcommand};
use kvreg_core::{KeyRequest, KeyValueRequest};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the node to talk to, e.g. http://0.0.0.0:5001.
    #[arg(short, long)]
    server_address: String,
}

#[derive(Subcommand)]
enum Commands {
    /// GET /status
    Status,
    /// GET /get_data
    Get { key: String },
    /// PUT /put_data
    Put { key: String, value: String },
    /// POST /post_data
    Post { key: String, value: String },
    /// DELETE /delete_data
    Delete { key: String },
    /// HEAD /head_data
    Head { key: String },
    /// PATCH /update_data
    Update { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    info!("talking to node at {}", cli.server_address);

    let result: serde_json::Value = match &cli.command {
        Commands::Status => {
            client
                .get(format!("{}/status", cli.server_address))
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Get { key } => {
            client
                .get(format!("{}/get_data", cli.server_address))
                .json(&KeyRequest { key: key.clone() })
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Put { key, value } => {
            client
                .put(format!("{}/put_data", cli.server_address))
                .json(&KeyValueRequest {
                    key: key.clone(),
                    value: value.clone(),
                })
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Post { key, value } => {
            client
                .post(format!("{}/post_data", cli.server_address))
                .json(&KeyValueRequest {
                    key: key.clone(),
                    value: value.clone(),
                })
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Delete { key } => {
            client
                .delete(format!("{}/delete_data", cli.server_address))
                .json(&KeyRequest { key: key.clone() })
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Head { key } => {
            client
                .head(format!("{}/head_data", cli.server_address))
                .json(&KeyRequest { key: key.clone() })
                .send()
                .await?
                .json()
                .await?
        }
        Commands::Update { key, value } => {
            client
                .patch(format!("{}/update_data", cli.server_address))
                .json(&KeyValueRequest {
                    key: key.clone(),
                    value: value.clone(),
                })
                .send()
                .await?
                .json()
                .await?
        }
    };

    info!("result: {}", result);
    println!("{result}");
    Ok(())
}
