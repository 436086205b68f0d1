use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::error;

use staywise::answer::AnswerService;
use staywise::config::AppConfig;
use staywise::embeddings::GeminiClient;
use staywise::indexer::IngestionPipeline;
use staywise::llm::OpenRouterClient;
use staywise::vector_store::PineconeClient;
use staywise::{Result, StaywiseError, server};

#[derive(Parser)]
#[command(name = "staywise")]
#[command(about = "A retrieval-grounded question answering service for short-term rental guests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP question answering server
    Serve {
        /// Port to listen on, overriding the configured value
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chunk, embed and upsert property documents into the vector store
    Ingest {
        /// Folder of .txt property documents, overriding the configured value
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Answer a single question from the command line
    Ask {
        /// The guest question to answer
        question: String,
        /// Restrict retrieval to one property's records
        #[arg(long)]
        property: Option<String>,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.http_port = port;
            }
            server::serve(config).await?;
        }
        Commands::Ingest { folder } => {
            let folder = folder.unwrap_or_else(|| PathBuf::from(&config.property_data_dir));
            let report =
                tokio::task::spawn_blocking(move || IngestionPipeline::new(config)?.run(&folder))
                    .await
                    .map_err(|e| StaywiseError::Other(e.into()))??;
            println!(
                "Ingestion complete: {} documents read, {} chunks, {} vectors upserted",
                report.documents_read, report.chunks_read, report.vectors_upserted
            );
        }
        Commands::Ask { question, property } => {
            let answer = tokio::task::spawn_blocking(move || {
                answer_once(config, &question, property.as_deref())
            })
            .await
            .map_err(|e| StaywiseError::Other(e.into()))?;
            println!("{answer}");
        }
        Commands::Config => {
            print_config(&config);
        }
    }

    Ok(())
}

fn answer_once(config: AppConfig, question: &str, property_id: Option<&str>) -> String {
    let embedder = GeminiClient::new(&config);
    let chat = OpenRouterClient::new(&config);
    let index = config.pinecone_api_key.as_deref().and_then(|api_key| {
        match PineconeClient::new(api_key).index(&config.pinecone_index_name) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(
                    "Could not connect to index '{}': {}",
                    config.pinecone_index_name, e
                );
                None
            }
        }
    });

    AnswerService::new(config, embedder, index, chat).answer(question, property_id)
}

fn print_config(config: &AppConfig) {
    let secret = |value: &Option<String>| if value.is_some() { "set" } else { "not set" };

    println!("Current configuration:");
    println!("  Pinecone API key:     {}", secret(&config.pinecone_api_key));
    println!("  Pinecone index:       {}", config.pinecone_index_name);
    println!(
        "  Pinecone environment: {}",
        config.pinecone_environment.as_deref().unwrap_or("not set")
    );
    println!("  Google API key:       {}", secret(&config.google_api_key));
    println!("  Embedding model:      {}", config.google_embedding_model_id);
    println!("  Embedding dimensions: {}", config.embedding_dimensions);
    println!("  OpenRouter API key:   {}", secret(&config.openrouter_api_key));
    println!(
        "  OpenRouter model:     {}",
        config.openrouter_model_name.as_deref().unwrap_or("not set")
    );
    println!("  Retrieval top k:      {}", config.top_k);
    println!("  Max chunk chars:      {}", config.max_chunk_chars);
    println!("  Chunk overlap:        {}", config.chunk_overlap);
    println!("  Property data dir:    {}", config.property_data_dir);
    println!("  HTTP port:            {}", config.http_port);

    let missing_query = config.missing_for_query();
    if missing_query.is_empty() {
        println!("  Query path:           ready");
    } else {
        println!("  Query path:           missing {}", missing_query.join(", "));
    }
    let missing_ingest = config.missing_for_ingest();
    if missing_ingest.is_empty() {
        println!("  Ingestion:            ready");
    } else {
        println!("  Ingestion:            missing {}", missing_ingest.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["staywise", "config"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Config);
        }
    }

    #[test]
    fn serve_command_with_port() {
        let cli = Cli::try_parse_from(["staywise", "serve", "--port", "9090"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { port } = parsed.command {
                assert_eq!(port, Some(9090));
            }
        }
    }

    #[test]
    fn ingest_command_with_folder() {
        let cli = Cli::try_parse_from(["staywise", "ingest", "--folder", "./docs"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { folder } = parsed.command {
                assert_eq!(folder, Some(PathBuf::from("./docs")));
            }
        }
    }

    #[test]
    fn ask_command_with_property() {
        let cli = Cli::try_parse_from([
            "staywise",
            "ask",
            "What is the wifi password?",
            "--property",
            "Unit_4B",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, property } = parsed.command {
                assert_eq!(question, "What is the wifi password?");
                assert_eq!(property, Some("Unit_4B".to_string()));
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["staywise", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["staywise", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
