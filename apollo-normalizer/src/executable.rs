//! Main entry point for the CLI command that normalizes a response.

use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use crate::configuration::generate_config_schema;
use crate::configuration::Configuration;
use crate::json_ext::Value;
use crate::normalizer::Normalizer;
use crate::shape::SelectionShape;
use crate::stream::ChunkStream;

/// Options for the normalizer
#[derive(Parser, Debug)]
#[clap(
    name = "normalize",
    about = "Normalize a GraphQL response into records, one JSON chunk per line"
)]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[clap(long = "log", default_value = "info", env = "APOLLO_NORMALIZER_LOG")]
    log_level: String,

    /// Emit logs as JSON.
    #[clap(long = "json-logs", env = "APOLLO_NORMALIZER_JSON_LOGS")]
    json_logs: bool,

    /// Selection shape of the operation, as JSON.
    #[clap(short, long = "shape", env = "APOLLO_NORMALIZER_SHAPE_PATH")]
    shape_path: Option<PathBuf>,

    /// Response to normalize, as JSON. `-` reads it from stdin.
    #[clap(short, long = "response", default_value = "-")]
    response_path: PathBuf,

    /// Variables of the operation, as a JSON object.
    #[clap(long = "variables")]
    variables_path: Option<PathBuf>,

    /// Configuration file, as YAML.
    #[clap(short, long = "config", env = "APOLLO_NORMALIZER_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Print the configuration JSON schema and exit.
    #[clap(long)]
    schema: bool,
}

/// This is the main normalizer entrypoint.
pub fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(start(Opt::parse()))
}

async fn start(opt: Opt) -> Result<()> {
    if opt.schema {
        let schema = generate_config_schema();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let builder = tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::try_new(&opt.log_level).context("could not parse log configuration")?,
        )
        .with_writer(std::io::stderr);
    if opt.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let configuration = match &opt.config_path {
        Some(path) => Configuration::from_file(path)
            .with_context(|| format!("could not load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };

    let shape_path = opt
        .shape_path
        .as_ref()
        .ok_or_else(|| anyhow!("a selection shape must be set using '--shape'"))?;
    let shape = SelectionShape::from_json(&read_input(shape_path)?)
        .with_context(|| format!("could not parse the selection shape {}", shape_path.display()))?;

    let variables = match &opt.variables_path {
        Some(path) => match parse_json(&read_input(path)?, path)? {
            Value::Object(variables) => variables,
            _ => return Err(anyhow!("variables in {} must be an object", path.display())),
        },
        None => Default::default(),
    };

    let response = parse_json(&read_input(&opt.response_path)?, &opt.response_path)?;

    let normalizer = Normalizer::builder()
        .shape(shape)
        .variables(variables)
        .configuration(configuration)
        .build()?;
    tracing::debug!(operation = ?normalizer.shape().name, "normalizing response");

    let chunks = normalizer.stream(response);
    write_chunks(chunks, std::io::stdout()).await
}

/// Print chunks as JSON lines, failing unless the run completed.
async fn write_chunks<W: Write>(mut chunks: ChunkStream, mut out: W) -> Result<()> {
    let mut completed = false;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("could not normalize the response")?;
        serde_json::to_writer(&mut out, &chunk)?;
        out.write_all(b"\n")?;
        if chunk.is_complete() {
            out.flush()?;
            completed = true;
        }
    }

    if !completed {
        return Err(anyhow!(
            "could not normalize the response: the chunk stream ended before the run completed"
        ));
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    let mut input = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut input)
            .context("could not read stdin")?;
    } else {
        input = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
    }
    Ok(input)
}

fn parse_json(input: &str, path: &Path) -> Result<Value> {
    serde_json::from_str(input).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::chunk::Chunk;
    use crate::chunk::Handle;

    #[test]
    fn command_line() {
        Opt::command().debug_assert();

        let opt = Opt::parse_from(["normalize", "--shape", "shape.json"]);
        assert_eq!(opt.response_path, PathBuf::from("-"));
        assert_eq!(opt.shape_path, Some(PathBuf::from("shape.json")));
        assert!(!opt.schema);
    }

    #[tokio::test]
    async fn truncated_stream_is_a_failure() {
        let (sender, receiver) = tokio::sync::mpsc::channel(1);
        sender.send(Ok(Chunk::Extend {
            handle: Handle::new(0),
            fields: Default::default(),
        }))
        .await
        .unwrap();
        drop(sender);

        let mut out = Vec::new();
        let error = write_chunks(ReceiverStream::new(receiver), &mut out)
            .await
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "could not normalize the response: the chunk stream ended before the run completed"
        );
    }

    #[tokio::test]
    async fn completed_stream_is_written_as_json_lines() {
        let (sender, receiver) = tokio::sync::mpsc::channel(1);
        sender.send(Ok(Chunk::Complete)).await.unwrap();
        drop(sender);

        let mut out = Vec::new();
        write_chunks(ReceiverStream::new(receiver), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"kind\":\"Complete\"}\n");
    }

    #[test]
    fn parse_json_reports_the_input() {
        let error = parse_json("{", Path::new("response.json")).unwrap_err();
        assert_eq!(error.to_string(), "response.json is not valid JSON");
    }
}
