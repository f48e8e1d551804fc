#![no_main]

use libfuzzer_sys::fuzz_target;
use lnprune_dependency::{BuildOptions, build_from_graph};
use lnprune_model::ModuleTree;

fuzz_target!(|data: &[u8]| {
    if let Ok(graph) = lnprune_onnx::decode_model(data) {
        // Building over any decodable graph should never panic.
        let model = ModuleTree::from_graph(&graph);
        let _ = build_from_graph(&model, &graph, &BuildOptions::default());
    }
});
