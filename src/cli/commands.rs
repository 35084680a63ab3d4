//! Subcommand implementations, following the teacher's `commands.rs`
//! convention of one function per subcommand that `main` dispatches to
//! and that returns `anyhow::Result`.

use std::path::{Path, PathBuf};

use tracing::info_span;

use crate::builder::AstToPeBuilder;
use crate::cfg::CfgBuilder;
use crate::cli::args::{GraphFormat, GraphKind};
use crate::config::CoreConfig;
use crate::defuse::DefUseAnalyzer;
use crate::emit::{emit_dot, emit_edges, PdgView};
use crate::pdg::PdgBuilder;
use crate::pe::PeKind;
use crate::parser::TreeSitterAnalyzer;

pub fn run_analyze(
    file: &Path,
    config_path: Option<PathBuf>,
    format: GraphFormat,
    graph: GraphKind,
    only: Option<String>,
) -> anyhow::Result<String> {
    let config = match config_path {
        Some(path) => CoreConfig::load(&path)?,
        None => CoreConfig::default(),
    };

    let analyzer = TreeSitterAnalyzer::new()?;
    let ast = {
        let _span = info_span!("parse", file = %file.display()).entered();
        analyzer.parse_file(file)?
    };
    if ast.has_error() {
        tracing::warn!(file = %file.display(), "parsed with syntax errors; proceeding best-effort");
    }

    let build_result = {
        let _span = info_span!("build_pe").entered();
        AstToPeBuilder::new(&ast).build()
    };

    let defuse = DefUseAnalyzer::new();
    let mut out = String::new();

    for class in &build_result.classes {
        let methods = match &class.borrow().kind {
            PeKind::Class(c) => c.methods.clone(),
            _ => continue,
        };
        for method_pe in &methods {
            let (method_data, method_name) = {
                let b = method_pe.borrow();
                match &b.kind {
                    PeKind::Method(m) => (m.clone(), m.name.clone().unwrap_or_else(|| "<lambda>".to_string())),
                    _ => continue,
                }
            };
            if let Some(filter) = &only {
                if &method_name != filter {
                    continue;
                }
            }

            tracing::debug!(method = %method_name, "building graphs");
            let cfg = {
                let _span = info_span!("build_cfg", method = %method_name).entered();
                CfgBuilder::new().build(&method_data)
            };

            let pdg = match graph {
                GraphKind::Cfg => None,
                GraphKind::Pdg => {
                    let _span = info_span!("build_pdg", method = %method_name).entered();
                    Some(PdgBuilder::new(&cfg, config.pdg, &defuse).build(&method_data))
                }
            };

            let rendered = {
                let _span = info_span!("emit", method = %method_name).entered();
                match &pdg {
                    Some(pdg) => render(&PdgView { pdg, cfg: &cfg }, format, &method_name),
                    None => render(&cfg, format, &method_name),
                }
            };

            out.push_str(&format!("# {method_name}\n"));
            out.push_str(&rendered);
            out.push('\n');
        }
    }

    Ok(out)
}

fn render(graph: &impl crate::emit::EmittableGraph, format: GraphFormat, name: &str) -> String {
    match format {
        GraphFormat::Edges => emit_edges(graph),
        GraphFormat::Dot => emit_dot(graph, &sanitize_dot_name(name)),
    }
}

fn sanitize_dot_name(name: &str) -> String {
    let cleaned: String = name.chars().map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' }).collect();
    if cleaned.is_empty() {
        "method".to_string()
    } else {
        cleaned
    }
}
