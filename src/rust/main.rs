use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use glossclass::{
    ClassificationPort, GlossClassifier, HanModelConfig, HanOnnxClassifier, ModelManager, Router,
    RuntimeConfig, Vocabulary, WordTokenizer,
};
use log::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Serves gloss classification over HTTP", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Tokenizer model (tokenizer.json), as a path or http(s) URL
    #[arg(short = 't', long = "tokenizer-model")]
    tokenizer_model: String,

    /// HAN classifier model (ONNX), as a path or http(s) URL
    #[arg(short = 'm', long = "han-model")]
    han_model: String,

    /// File with one class label per line, in model output order
    #[arg(short = 'c', long = "classes-filename")]
    classes_filename: String,

    /// Number of classifier instances serving requests in parallel
    #[arg(long, default_value_t = 1)]
    pool_size: usize,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,

    /// ONNX Runtime inter-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    inter_threads: usize,

    /// Expected SHA-256 of the tokenizer model
    #[arg(long)]
    tokenizer_sha256: Option<String>,

    /// Expected SHA-256 of the HAN model
    #[arg(long)]
    han_model_sha256: Option<String>,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = glossclass::server::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

fn build_classifier(
    args: &Args,
    tokenizer_path: &Path,
    model_path: &Path,
) -> anyhow::Result<GlossClassifier> {
    let tokenizer = WordTokenizer::from_file(tokenizer_path)?;
    let config = HanModelConfig::default();
    let vocabulary = Vocabulary::from_tokenizer(tokenizer.inner(), &config)?;
    info!("Vocabulary holds {} entries", vocabulary.len());

    let runtime = RuntimeConfig {
        inter_threads: args.inter_threads,
        intra_threads: args.intra_threads,
        ..RuntimeConfig::default()
    };
    let primary = HanOnnxClassifier::from_file(model_path, vocabulary, config, &runtime)?;

    let pool_size = if args.pool_size == 0 {
        warn!("Pool size 0 requested, using a single classifier instance");
        1
    } else {
        args.pool_size
    };
    let mut instances: Vec<Box<dyn ClassificationPort>> = Vec::with_capacity(pool_size);
    for _ in 1..pool_size {
        instances.push(Box::new(primary.replicate()));
    }
    instances.push(Box::new(primary));

    let classifier = GlossClassifier::builder()
        .with_tokenizer(tokenizer)
        .with_classifiers(instances)
        .with_labels_file(&args.classes_filename)?
        .build()?;
    Ok(classifier)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C, running until killed: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glossclass::init_logger();
    let args = Args::parse();

    info!("=== Starting Gloss Classifier ===");
    let start_time = Instant::now();

    let manager = ModelManager::new_default().context("Failed to prepare the models directory")?;
    let tokenizer_path = manager
        .resolve(&args.tokenizer_model, args.tokenizer_sha256.as_deref())
        .await
        .with_context(|| format!("Failed to resolve tokenizer model '{}'", args.tokenizer_model))?;
    let model_path = manager
        .resolve(&args.han_model, args.han_model_sha256.as_deref())
        .await
        .with_context(|| format!("Failed to resolve HAN model '{}'", args.han_model))?;

    let classifier = build_classifier(&args, &tokenizer_path, &model_path)
        .context("Failed to build the gloss classifier")?;

    let info = classifier.info();
    info!("Classes ({}): {}", info.num_classes, info.class_labels.join(", "));
    info!("Classifier instances: {}", info.pool_size);
    info!("=== Classifier Ready (took {:.2?}) ===", start_time.elapsed());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let router = Router::new(Arc::new(classifier));

    glossclass::server::bind_and_serve(addr, router, args.max_body_bytes, shutdown_signal())
        .await
        .with_context(|| format!("Server on {} failed", addr))?;

    info!("=== Gloss Classifier Stopped ===");
    Ok(())
}
