//! Typed render graph.
//!
//! A [`FilterGraph`] is an append-only list of operations. Every operation
//! yields a [`Track`] handle that later operations consume. Graphs are built
//! by the aligner, composer and mixer, then handed to a media engine which
//! compiles them into its own command form.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use stitcher_common::error::{StitchError, StitchResult};
use stitcher_timeline::period::{format_secs, Timestamp};

/// Whether a track carries pictures or samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    fn stream_letter(self) -> char {
        match self {
            MediaKind::Video => 'v',
            MediaKind::Audio => 'a',
        }
    }
}

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to the output of one graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Track {
    node: NodeId,
    kind: MediaKind,
}

impl Track {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// One render operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// First stream of the given kind in a media file.
    Source { path: PathBuf },
    /// Black frames or silence. `rate` is fps for video, sample rate for audio.
    Filler {
        duration_micros: i64,
        width: u32,
        height: u32,
        rate: u32,
    },
    /// Keep `[start, start + duration)` and reset timestamps to zero.
    Trim {
        start_micros: i64,
        duration_micros: i64,
    },
    /// Play the inputs back to back.
    Concat { segments: usize },
    /// Fit inside `width`x`height` keeping aspect ratio, centred on black.
    ScaleLetterbox { width: u32, height: u32 },
    /// Draw the second input over the first at `(x, y)`.
    Overlay { x: i32, y: i32 },
    /// Constant output framerate.
    Framerate { fps: u32 },
    /// Equal-weight linear mix.
    Mix { inputs: usize },
    /// Wall-clock time in a left-hand corner, starting at `epoch`.
    BurnTimestamp { epoch: Timestamp, edge: Edge },
}

/// Which edge of the frame a burned-in caption sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    pub kind: MediaKind,
    pub inputs: Vec<Track>,
}

/// Engine-ready form of a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    /// Media files, in input-slot order.
    pub inputs: Vec<PathBuf>,
    /// `;`-separated filter chains. Empty when the output is a bare source.
    pub filter_complex: String,
    /// Label or stream specifier to map as the output.
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<Node>,
}

fn graph_error(msg: impl Into<String>) -> StitchError {
    StitchError::engine("filtergraph", msg)
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, track: Track) -> &Node {
        &self.nodes[track.node.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, op: Op, kind: MediaKind, inputs: Vec<Track>) -> Track {
        let node = NodeId(self.nodes.len());
        self.nodes.push(Node { op, kind, inputs });
        Track { node, kind }
    }

    pub fn source(&mut self, path: impl Into<PathBuf>, kind: MediaKind) -> Track {
        self.push(Op::Source { path: path.into() }, kind, Vec::new())
    }

    pub fn black(&mut self, duration_micros: i64, width: u32, height: u32, fps: u32) -> Track {
        self.push(
            Op::Filler {
                duration_micros,
                width,
                height,
                rate: fps,
            },
            MediaKind::Video,
            Vec::new(),
        )
    }

    pub fn silence(&mut self, duration_micros: i64, sample_rate: u32) -> Track {
        self.push(
            Op::Filler {
                duration_micros,
                width: 0,
                height: 0,
                rate: sample_rate,
            },
            MediaKind::Audio,
            Vec::new(),
        )
    }

    pub fn trim(&mut self, input: Track, start_micros: i64, duration_micros: i64) -> Track {
        self.push(
            Op::Trim {
                start_micros,
                duration_micros,
            },
            input.kind,
            vec![input],
        )
    }

    /// Concatenate same-kind segments. A single segment is returned as is.
    pub fn concat(&mut self, segments: &[Track]) -> StitchResult<Track> {
        let first = *segments
            .first()
            .ok_or_else(|| graph_error("concat needs at least one segment"))?;
        if segments.iter().any(|t| t.kind != first.kind) {
            return Err(graph_error("concat segments must share a media kind"));
        }
        if segments.len() == 1 {
            return Ok(first);
        }
        Ok(self.push(
            Op::Concat {
                segments: segments.len(),
            },
            first.kind,
            segments.to_vec(),
        ))
    }

    pub fn scale_letterbox(&mut self, input: Track, width: u32, height: u32) -> Track {
        self.push(
            Op::ScaleLetterbox { width, height },
            MediaKind::Video,
            vec![input],
        )
    }

    pub fn overlay(&mut self, base: Track, top: Track, x: i32, y: i32) -> Track {
        self.push(Op::Overlay { x, y }, MediaKind::Video, vec![base, top])
    }

    pub fn framerate(&mut self, input: Track, fps: u32) -> Track {
        self.push(Op::Framerate { fps }, MediaKind::Video, vec![input])
    }

    pub fn mix(&mut self, inputs: &[Track]) -> StitchResult<Track> {
        if inputs.len() < 2 {
            return Err(graph_error("mix needs at least two inputs"));
        }
        if inputs.iter().any(|t| t.kind != MediaKind::Audio) {
            return Err(graph_error("mix inputs must be audio"));
        }
        Ok(self.push(
            Op::Mix {
                inputs: inputs.len(),
            },
            MediaKind::Audio,
            inputs.to_vec(),
        ))
    }

    pub fn burn_timestamp(&mut self, input: Track, epoch: Timestamp, edge: Edge) -> Track {
        self.push(
            Op::BurnTimestamp { epoch, edge },
            MediaKind::Video,
            vec![input],
        )
    }

    /// Statically known duration of a track, `None` for untrimmed sources.
    pub fn duration_micros(&self, track: Track) -> Option<i64> {
        let node = self.node(track);
        match &node.op {
            Op::Source { .. } => None,
            Op::Filler {
                duration_micros, ..
            }
            | Op::Trim {
                duration_micros, ..
            } => Some(*duration_micros),
            Op::Concat { .. } => node
                .inputs
                .iter()
                .map(|t| self.duration_micros(*t))
                .sum(),
            Op::Mix { .. } => node
                .inputs
                .iter()
                .map(|t| self.duration_micros(*t))
                .collect::<Option<Vec<_>>>()
                .and_then(|d| d.into_iter().max()),
            Op::ScaleLetterbox { .. }
            | Op::Overlay { .. }
            | Op::Framerate { .. }
            | Op::BurnTimestamp { .. } => self.duration_micros(node.inputs[0]),
        }
    }

    /// Media files reachable from `output`.
    pub fn sources(&self, output: Track) -> Vec<PathBuf> {
        self.reachable(output)
            .into_iter()
            .filter_map(|id| match &self.nodes[id.0].op {
                Op::Source { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Node ids `output` depends on, in creation order.
    fn reachable(&self, output: Track) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![output.node];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.nodes[id.0].inputs.iter().map(|t| t.node));
            }
        }
        let mut ids: Vec<_> = seen.into_iter().collect();
        ids.sort();
        ids
    }

    /// Compile the subgraph feeding `output` into ffmpeg filter syntax.
    ///
    /// Source files become inputs numbered from `first_input`. Only nodes
    /// `output` depends on are emitted, and each may be consumed once.
    pub fn compile(&self, output: Track, first_input: usize) -> StitchResult<CompiledGraph> {
        if output.node.0 >= self.nodes.len() {
            return Err(graph_error("output track does not belong to this graph"));
        }
        let order = self.reachable(output);

        let mut uses: HashMap<NodeId, usize> = HashMap::new();
        for id in &order {
            for input in &self.nodes[id.0].inputs {
                *uses.entry(input.node).or_default() += 1;
            }
        }
        if let Some((id, _)) = uses.iter().find(|(_, n)| **n > 1) {
            return Err(graph_error(format!(
                "node {} is consumed more than once",
                id.0
            )));
        }

        let mut inputs = Vec::new();
        let mut labels: HashMap<NodeId, String> = HashMap::new();
        let mut chains = Vec::new();

        for id in order {
            let node = &self.nodes[id.0];
            if let Op::Source { path } = &node.op {
                let slot = first_input + inputs.len();
                inputs.push(path.clone());
                labels.insert(id, format!("{slot}:{}:0", node.kind.stream_letter()));
                continue;
            }

            let mut chain = String::new();
            for input in &node.inputs {
                let label = labels
                    .get(&input.node)
                    .ok_or_else(|| graph_error("graph input defined after its consumer"))?;
                chain.push_str(&format!("[{label}]"));
            }
            chain.push_str(&filter_expr(&node.op, node.kind));
            let label = format!("n{}", id.0);
            chain.push_str(&format!("[{label}]"));
            chains.push(chain);
            labels.insert(id, label);
        }

        let output_label = labels
            .remove(&output.node)
            .ok_or_else(|| graph_error("output track was not compiled"))?;
        let output = if chains.is_empty() {
            output_label
        } else {
            format!("[{output_label}]")
        };

        Ok(CompiledGraph {
            inputs,
            filter_complex: chains.join(";"),
            output,
        })
    }
}

fn filter_expr(op: &Op, kind: MediaKind) -> String {
    match (op, kind) {
        (
            Op::Filler {
                duration_micros,
                width,
                height,
                rate,
            },
            MediaKind::Video,
        ) => format!(
            "color=c=black:s={width}x{height}:r={rate}:d={},setsar=1",
            format_secs(*duration_micros)
        ),
        (
            Op::Filler {
                duration_micros,
                rate,
                ..
            },
            MediaKind::Audio,
        ) => format!(
            "anullsrc=r={rate}:cl=stereo,atrim=duration={}",
            format_secs(*duration_micros)
        ),
        (
            Op::Trim {
                start_micros,
                duration_micros,
            },
            MediaKind::Video,
        ) => format!(
            "trim=start={}:duration={},setpts=PTS-STARTPTS",
            format_secs(*start_micros),
            format_secs(*duration_micros)
        ),
        (
            Op::Trim {
                start_micros,
                duration_micros,
            },
            MediaKind::Audio,
        ) => format!(
            "atrim=start={}:duration={},asetpts=PTS-STARTPTS",
            format_secs(*start_micros),
            format_secs(*duration_micros)
        ),
        (Op::Concat { segments }, MediaKind::Video) => format!("concat=n={segments}:v=1:a=0"),
        (Op::Concat { segments }, MediaKind::Audio) => format!("concat=n={segments}:v=0:a=1"),
        (Op::ScaleLetterbox { width, height }, _) => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1"
        ),
        (Op::Overlay { x, y }, _) => format!("overlay=x={x}:y={y}"),
        (Op::Framerate { fps }, _) => format!("fps={fps}"),
        (Op::Mix { inputs }, _) => {
            format!("amix=inputs={inputs}:duration=longest:dropout_transition=0")
        }
        (Op::BurnTimestamp { epoch, edge }, _) => format!(
            "drawtext=text='%{{pts\\:gmtime\\:{}}}':fontcolor=white:shadowcolor=black:\
             shadowx=1:shadowy=2:fontsize=20:x=0:y={}",
            format_secs(epoch.as_micros()),
            match edge {
                Edge::Top => "0",
                Edge::Bottom => "h-th",
            }
        ),
        (Op::Source { .. }, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_trimmed_source() {
        let mut g = FilterGraph::new();
        let src = g.source("/in/a.webm", MediaKind::Video);
        let out = g.trim(src, 2_000_000, 3_500_000);

        let compiled = g.compile(out, 0).unwrap();
        assert_eq!(compiled.inputs, vec![PathBuf::from("/in/a.webm")]);
        assert_eq!(
            compiled.filter_complex,
            "[0:v:0]trim=start=2.000000:duration=3.500000,setpts=PTS-STARTPTS[n1]"
        );
        assert_eq!(compiled.output, "[n1]");
        assert_eq!(g.duration_micros(out), Some(3_500_000));
    }

    #[test]
    fn test_compile_numbers_inputs_from_offset() {
        let mut g = FilterGraph::new();
        let a = g.source("a.webm", MediaKind::Audio);
        let b = g.source("b.webm", MediaKind::Audio);
        let a = g.trim(a, 0, 1_000_000);
        let b = g.trim(b, 0, 2_000_000);
        let mixed = g.mix(&[a, b]).unwrap();

        let compiled = g.compile(mixed, 1).unwrap();
        assert_eq!(compiled.inputs.len(), 2);
        assert!(compiled.filter_complex.starts_with("[1:a:0]atrim"));
        assert!(compiled.filter_complex.contains("[2:a:0]atrim"));
        assert!(compiled
            .filter_complex
            .ends_with("[n2][n3]amix=inputs=2:duration=longest:dropout_transition=0[n4]"));
        assert_eq!(g.duration_micros(mixed), Some(2_000_000));
    }

    #[test]
    fn test_unreachable_nodes_are_not_emitted() {
        let mut g = FilterGraph::new();
        let _unused = g.black(1_000_000, 10, 10, 25);
        let out = g.silence(1_000_000, 48_000);

        let compiled = g.compile(out, 0).unwrap();
        assert!(compiled.inputs.is_empty());
        assert_eq!(
            compiled.filter_complex,
            "anullsrc=r=48000:cl=stereo,atrim=duration=1.000000[n1]"
        );
    }

    #[test]
    fn test_double_consumption_rejected() {
        let mut g = FilterGraph::new();
        let base = g.black(1_000_000, 10, 10, 25);
        let out = g.overlay(base, base, 0, 0);
        assert!(g.compile(out, 0).is_err());
    }

    #[test]
    fn test_bare_source_maps_stream_directly() {
        let mut g = FilterGraph::new();
        let src = g.source("a.webm", MediaKind::Video);
        let compiled = g.compile(src, 1).unwrap();
        assert_eq!(compiled.output, "1:v:0");
        assert!(compiled.filter_complex.is_empty());
        assert_eq!(g.duration_micros(src), None);
    }

    #[test]
    fn test_concat_rejects_mixed_kinds() {
        let mut g = FilterGraph::new();
        let v = g.black(1, 2, 2, 25);
        let a = g.silence(1, 48_000);
        assert!(g.concat(&[v, a]).is_err());
        assert!(g.concat(&[]).is_err());
        assert_eq!(g.concat(&[v]).unwrap(), v);
    }

    #[test]
    fn test_burn_timestamp_escapes_colons() {
        let mut g = FilterGraph::new();
        let v = g.black(1_000_000, 320, 240, 25);
        let out = g.burn_timestamp(
            v,
            Timestamp::from_micros(1_589_462_405_000_000),
            Edge::Bottom,
        );
        let compiled = g.compile(out, 0).unwrap();
        assert!(compiled
            .filter_complex
            .contains("text='%{pts\\:gmtime\\:1589462405.000000}'"));
        assert!(compiled.filter_complex.contains(":x=0:y=h-th"));
    }

    #[test]
    fn test_burn_timestamp_top_edge() {
        let mut g = FilterGraph::new();
        let v = g.black(1_000_000, 320, 240, 25);
        let out = g.burn_timestamp(v, Timestamp::from_micros(0), Edge::Top);
        let compiled = g.compile(out, 0).unwrap();
        assert!(compiled.filter_complex.contains("fontsize=20:x=0:y=0"));
        assert_eq!(g.duration_micros(out), Some(1_000_000));
    }
}
