use tracing::debug;

use crate::error::{CompositionError, Result};
use crate::graph::fragment::{audio_fragment, visual_fragment, AudioSource, Canvas};
use crate::graph::ir::{Filter, FilterChain, FilterGraph, Pad};
use crate::resource::{partition, ResourceDescriptor};

/// Label of the final video stream
pub const OUTPUT_VIDEO: &str = "outv";

/// Label of the mixed audio stream
pub const OUTPUT_AUDIO: &str = "outa";

/// Crossfade (seconds) `amix` uses when an input ends
const MIX_DROPOUT_TRANSITION: u32 = 2;

/// A complete graph plus the pads the encoder should map
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledGraph {
    pub graph: FilterGraph,

    /// Always `[outv]`
    pub video_output: Pad,

    /// Absent when no audio resource was supplied
    pub audio_output: Option<Pad>,

    /// Sum of visual durations; `None` when a video has no declared duration
    pub expected_duration: Option<f64>,
}

/// Sum of the visual resources' durations
pub fn expected_duration(resources: &[ResourceDescriptor]) -> Option<f64> {
    resources
        .iter()
        .filter(|r| r.is_visual())
        .map(|r| r.duration)
        .sum::<Option<f64>>()
}

/// Merge every resource into one filter graph
///
/// Pad labels only depend on the resource's position in the list, so the same
/// input always produces the same graph text.
pub fn assemble(resources: &[ResourceDescriptor], canvas: &Canvas) -> Result<AssembledGraph> {
    if resources.is_empty() {
        return Err(CompositionError::EmptyResourceList.into());
    }

    for (index, resource) in resources.iter().enumerate() {
        resource.validate(index)?;
    }

    let partition = partition(resources);
    let visuals = partition.visuals();
    if visuals.is_empty() {
        return Err(CompositionError::NoVisualContent.into());
    }

    let mut graph = FilterGraph::new();
    let video_output = Pad::label(OUTPUT_VIDEO);

    if let [only] = visuals.as_slice() {
        graph.push(visual_fragment(*only, canvas, video_output.clone())?);
    } else {
        let mut pads = Vec::with_capacity(visuals.len());
        for item in &visuals {
            let pad = Pad::label(format!("v{}", item.index));
            graph.push(visual_fragment(*item, canvas, pad.clone())?);
            pads.push(pad);
        }

        let concat = Filter::new("concat")
            .named("n", pads.len())
            .named("v", 1)
            .named("a", 0);
        graph.push(FilterChain::new(pads, vec![concat], vec![video_output.clone()]));
    }

    let mut audio_pads = Vec::new();
    for item in &partition.audios {
        match audio_fragment(*item) {
            AudioSource::Filtered { chain, output } => {
                graph.push(chain);
                audio_pads.push(output);
            }
            AudioSource::Raw(pad) => audio_pads.push(pad),
        }
    }

    let audio_output = match audio_pads.len() {
        0 => None,
        1 => audio_pads.pop(),
        inputs => {
            let amix = Filter::new("amix")
                .named("inputs", inputs)
                .named("duration", "longest")
                .named("dropout_transition", MIX_DROPOUT_TRANSITION);
            let output = Pad::label(OUTPUT_AUDIO);
            graph.push(FilterChain::new(audio_pads, vec![amix], vec![output.clone()]));
            Some(output)
        }
    };

    debug!(
        "Assembled graph: {} chains, {} visual, {} audio",
        graph.chains().len(),
        visuals.len(),
        partition.audios.len()
    );

    Ok(AssembledGraph {
        graph,
        video_output,
        audio_output,
        expected_duration: expected_duration(resources),
    })
}
