use lnprune_dependency::{BuildOptions, DependencyMap, build_from_graph};
use lnprune_ir::{ExportedGraph, Handle};
use lnprune_model::{Module, ModuleTree};
use lnprune_onnx::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
    ValueInfoProto,
};
use prost::Message;

/// Builds synthetic ONNX models the way `torch.onnx.export` lays them out:
/// parameters as initializers named `<module path>.weight`.
#[derive(Default)]
pub struct OnnxBuilder {
    graph: GraphProto,
    counter: usize,
}

#[allow(dead_code)]
impl OnnxBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            graph: GraphProto {
                name: name.into(),
                ..Default::default()
            },
            counter: 0,
        }
    }

    pub fn input(mut self, name: &str) -> Self {
        self.graph.input.push(ValueInfoProto::named(name));
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.graph.output.push(ValueInfoProto::named(name));
        self
    }

    pub fn node(mut self, op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        let name = format!("{op_type}_{}", self.counter);
        self.push(NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: outputs.iter().map(|s| s.to_string()).collect(),
            name,
            op_type: op_type.into(),
            ..Default::default()
        })
    }

    pub fn node_with(
        self,
        op_type: &str,
        inputs: &[&str],
        outputs: &[&str],
        attribute: AttributeProto,
    ) -> Self {
        let mut this = self.node(op_type, inputs, outputs);
        if let Some(last) = this.graph.node.last_mut() {
            last.attribute.push(attribute);
        }
        this
    }

    /// A 3x3 ONNX `Conv` reading `<module>.weight` and `<module>.bias`.
    pub fn conv(
        mut self,
        module: &str,
        input: &str,
        output: &str,
        channels: (i64, i64),
        groups: i64,
    ) -> Self {
        let (in_channels, out_channels) = channels;
        let weight = format!("{module}.weight");
        let bias = format!("{module}.bias");
        self.graph.initializer.push(TensorProto::declare(
            &weight,
            vec![out_channels, in_channels / groups, 3, 3],
        ));
        self.graph
            .initializer
            .push(TensorProto::declare(&bias, vec![out_channels]));
        self.node_with(
            "Conv",
            &[input, &weight, &bias],
            &[output],
            AttributeProto::int("group", groups),
        )
    }

    /// An `ATen` `_convolution` node with its scalar arguments fed by
    /// `Constant` nodes, as exported with `OperatorExportTypes.ONNX_ATEN`.
    pub fn aten_conv(
        mut self,
        module: &str,
        input: &str,
        output: &str,
        channels: (i64, i64),
        groups: i64,
    ) -> Self {
        let (in_channels, out_channels) = channels;
        let weight = format!("{module}.weight");
        self.graph.initializer.push(TensorProto::declare(
            &weight,
            vec![out_channels, in_channels / groups, 3, 3],
        ));
        let mut args = vec![input.to_string(), weight];
        args.push(String::new()); // bias omitted
        for (arg, value) in [
            ("stride", 1),
            ("padding", 1),
            ("dilation", 1),
            ("transposed", 0),
            ("output_padding", 0),
            ("groups", groups),
            ("benchmark", 0),
            ("deterministic", 0),
            ("cudnn_enabled", 1),
        ] {
            let tensor = format!("{output}::{arg}");
            self = self.constant(&tensor, value);
            args.push(tensor);
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.aten("_convolution", &args, &[output])
    }

    /// A generic `ATen` node.
    pub fn aten(self, operator: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        self.node_with(
            "ATen",
            inputs,
            outputs,
            AttributeProto::string("operator", operator),
        )
    }

    pub fn constant(self, output: &str, value: i64) -> Self {
        self.node_with(
            "Constant",
            &[],
            &[output],
            AttributeProto::tensor("value", TensorProto::scalar_i64(value)),
        )
    }

    /// `Flatten` followed by a `Gemm` reading `<module>.weight`.
    pub fn linear(mut self, module: &str, input: &str, output: &str, features: (i64, i64)) -> Self {
        let weight = format!("{module}.weight");
        self.graph
            .initializer
            .push(TensorProto::declare(&weight, vec![features.1, features.0]));
        let flat = format!("{input}_flat");
        self.node("Flatten", &[input], &[&flat])
            .node_with("Gemm", &[&flat, &weight], &[output], AttributeProto::int("transB", 1))
    }

    fn push(mut self, node: NodeProto) -> Self {
        self.graph.node.push(node);
        self.counter += 1;
        self
    }

    pub fn model(self) -> ModelProto {
        ModelProto {
            ir_version: 7,
            producer_name: "pytorch".into(),
            producer_version: "1.13.1".into(),
            graph: Some(self.graph),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 11,
            }],
        }
    }

    pub fn encode(self) -> Vec<u8> {
        self.model().encode_to_vec()
    }

    /// Encodes the model and decodes it back through the public API.
    pub fn graph(self) -> ExportedGraph {
        lnprune_onnx::decode_model(&self.encode()).expect("fixture must decode")
    }
}

#[allow(dead_code)]
pub type Map = DependencyMap<Handle<Module>>;

/// Builds the dependency map of `graph` against the module tree inferred
/// from its initializers.
#[allow(dead_code)]
pub fn build_map(graph: &ExportedGraph, options: &BuildOptions) -> Map {
    let model = ModuleTree::from_graph(graph);
    build_from_graph(&model, graph, options).expect("build failed")
}

/// `(depth, node string)` of every visit of entry `name`.
#[allow(dead_code)]
pub fn walk(map: &Map, name: &str) -> Vec<(usize, String)> {
    map.traverse(name)
        .unwrap_or_else(|| panic!("no entry '{name}'"))
        .map(|v| (v.depth, map.node(v.node).to_string()))
        .collect()
}

/// Labels of a list of node handles.
#[allow(dead_code)]
pub fn labels(map: &Map, nodes: &[lnprune_dependency::NodeHandle<Handle<Module>>]) -> Vec<String> {
    nodes.iter().map(|&h| map.node(h).to_string()).collect()
}
