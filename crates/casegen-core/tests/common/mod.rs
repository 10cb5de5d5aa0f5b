//! Fixtures shared by the pipeline tests.
#![allow(dead_code)]

use std::sync::Arc;

use case_store::fakes::MemoryCaseStore;
use casegen_core::fakes::ScriptedGenerator;
use casegen_core::{
    GenerationOrchestrator, GenerationRequest, PipelineConfig, RecordingObserver, RetryPolicy,
};
use serde_json::{json, Value};

pub const ARENA: &str = "finance";
pub const COMPETENCY: &str = "valuation";

pub fn request(blueprint: &str) -> GenerationRequest {
    GenerationRequest::new(ARENA, COMPETENCY).with_blueprint(blueprint)
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(3),
        ..PipelineConfig::default()
    }
}

pub fn outline() -> String {
    json!({
        "title": "Acquiring Northwind",
        "premise": "A mid-market acquisition under time pressure",
        "stages": ["Kickoff", "Diligence", "Valuation", "Negotiation", "Close", "Debrief"],
    })
    .to_string()
}

pub fn file(id: &str, name: &str, kind: &str, content: &str) -> Value {
    json!({ "file_id": id, "file_name": name, "type": kind, "content": content })
}

/// The standard three pending files: deck, spreadsheet, memo.
pub fn pending_files() -> Vec<Value> {
    vec![
        file("deck", "board-deck.md", "presentation", ""),
        file("fin", "financials.csv", "financial statements", ""),
        file("memo", "legal-memo.md", "legal memo", ""),
    ]
}

pub fn case_value(stages: usize, files: Vec<Value>) -> Value {
    let levels = json!({
        "exemplary": "Insightful and complete",
        "proficient": "Sound with minor gaps",
        "developing": "Partially correct",
        "beginning": "Largely incorrect",
    });
    json!({
        "title": "Acquiring Northwind",
        "description": vec!["analysis"; 260].join(" "),
        "difficulty": "advanced",
        "duration_minutes": 90,
        "stages": (1..=stages)
            .map(|i| json!({ "title": format!("Stage {i}"), "description": "Do the work" }))
            .collect::<Vec<_>>(),
        "rubric": {
            "criteria": (1..=8)
                .map(|i| json!({ "name": format!("Criterion {i}"), "levels": levels.clone() }))
                .collect::<Vec<_>>(),
        },
        "datasets": [
            { "name": "Income statement", "description": "Five years" },
            { "name": "Comparable deals", "description": "Twelve deals" },
            { "name": "Market sizing", "description": "Regional" },
        ],
        "files": files,
    })
}

pub fn case_json(stages: usize, files: Vec<Value>) -> String {
    serde_json::to_string_pretty(&case_value(stages, files)).unwrap()
}

pub fn deck(slides: usize) -> String {
    let bodies: Vec<String> = (1..=slides)
        .map(|i| format!("# Slide {i}\n- A point about the deal"))
        .collect();
    format!("---\nmarp: true\n---\n{}", bodies.join("\n---\n"))
}

pub fn csv(lines: usize) -> String {
    let mut rows = vec!["year,revenue,ebitda".to_string()];
    rows.extend((1..lines).map(|i| format!("{},{},{}", 2000 + i, i * 1000, i * 150)));
    rows.join("\n")
}

pub fn memo() -> String {
    let mut out = String::new();
    for section in ["Summary", "Background", "Risks", "Options", "Recommendation"] {
        out.push_str(&format!("## {section}\n\n{}\n\n", vec!["detail"; 200].join(" ")));
    }
    out
}

pub struct Harness {
    pub generator: Arc<ScriptedGenerator>,
    pub store: Arc<MemoryCaseStore>,
    pub observer: Arc<RecordingObserver>,
    pub orchestrator: GenerationOrchestrator,
}

pub fn harness(generator: ScriptedGenerator, config: PipelineConfig) -> Harness {
    harness_with_store(generator, config, MemoryCaseStore::seeded(ARENA, COMPETENCY))
}

pub fn harness_with_store(
    generator: ScriptedGenerator,
    config: PipelineConfig,
    store: MemoryCaseStore,
) -> Harness {
    let generator = Arc::new(generator);
    let store = Arc::new(store);
    let observer = Arc::new(RecordingObserver::new());
    let orchestrator = GenerationOrchestrator::new(generator.clone(), store.clone())
        .with_config(config)
        .with_observer(observer.clone());
    Harness {
        generator,
        store,
        observer,
        orchestrator,
    }
}
