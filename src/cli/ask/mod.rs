//! Ask command - runs the pipeline for a single question

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use anyhow::Context;
use clap::Args;
use serde_json::json;
use tracing::info;

use crate::domain::crag::{
    CragExecutor, NodeExecution, NodeId, PipelineGraph, PipelineRun, PipelineState, RunObserver,
};
use crate::infrastructure::crag::CragPipelineFactory;

const QUERY_PROMPT: &str = "Please type the query: ";

/// Arguments for the ask command
#[derive(Args, Clone, Debug, Default)]
pub struct AskArgs {
    /// Question to answer; read from stdin when omitted
    pub question: Option<String>,

    /// Print the full run record instead of the answer only
    #[arg(long)]
    pub json: bool,

    /// Plain retrieve-then-generate, without grading or web search
    #[arg(long)]
    pub basic: bool,
}

/// Answer one question
pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let question = match args.question {
        Some(question) => question,
        None => {
            let stdin = io::stdin();
            read_question(&mut stdin.lock(), &mut io::stdout())?
        }
    };

    let bundle = CragPipelineFactory::create(&config)
        .await
        .context("Failed to build pipeline")?;

    let pipeline = if args.basic {
        bundle.pipeline.with_graph(PipelineGraph::basic_rag())
    } else {
        bundle.pipeline
    };

    let printer = TracePrinter::new(io::stdout());
    let run = pipeline.run_observed(&question, &printer).await?;

    info!(run_id = %run.run_id, steps = run.steps, "Question answered");

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", render_result(&run, args.json)?)?;

    Ok(())
}

/// Prompt on `output` and read one line from `input`
fn read_question(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<String> {
    write!(output, "{}", QUERY_PROMPT)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn render_result(run: &PipelineRun, full: bool) -> serde_json::Result<String> {
    if full {
        serde_json::to_string_pretty(run)
    } else {
        serde_json::to_string_pretty(&json!({ "generation": run.generation() }))
    }
}

/// Writes `Node: '<name>'` and a separator as each node starts
struct TracePrinter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> TracePrinter<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> RunObserver for TracePrinter<W> {
    fn on_node_start(&self, node: NodeId) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "Node: '{}'", node);
            let _ = writeln!(out, "---");
        }
    }

    fn on_node_end(&self, execution: &NodeExecution, _state: &PipelineState) {
        tracing::debug!(
            node = %execution.node,
            duration_ms = execution.execution_time_ms,
            documents = execution.documents_after,
            "Node finished"
        );
    }
}
