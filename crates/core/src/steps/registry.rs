//! Static registry of pipeline steps and their required inputs.
//!
//! The registry is the single source of truth for step ordering (owned by
//! [`StepId::ALL`]), execution domain, and the input fields each step
//! needs before it may run. The validator evaluates these requirements
//! against the current pipeline state.

use vf_protocol::{PipelineState, StepDomain, StepId};

/// An input field a step needs (or benefits from) before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRequirement {
    /// A non-empty project topic.
    Topic,

    /// A non-empty response from an earlier step.
    StepResponse(StepId),

    /// The synthesized narration audio reference.
    NarrationAudio,

    /// Word-level narration timings.
    WordTimings,

    /// A non-empty scene list.
    SceneList,

    /// Every scene has a generated first-frame image.
    SceneImagesReady,

    /// Every scene has a generated video clip.
    SceneVideosReady,

    /// A voice has been selected (advisory; a default voice exists).
    VoiceSelected,

    /// A reference image exists (advisory; improves scene consistency).
    ReferenceImage,
}

impl InputRequirement {
    /// Check this requirement against the current state.
    ///
    /// Returns `None` when satisfied, otherwise a message and an optional
    /// recovery hint.
    pub fn check(&self, state: &PipelineState) -> Option<(String, Option<String>)> {
        match self {
            InputRequirement::Topic => {
                if state.topic.trim().is_empty() {
                    Some((
                        "no topic set".to_string(),
                        Some("enter a topic before running the pipeline".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::StepResponse(dep) => {
                if state.step(*dep).response.trim().is_empty() {
                    Some((
                        format!("missing output from \"{}\"", dep.label()),
                        Some(format!("run \"{}\" first", dep.label())),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::NarrationAudio => {
                if state.narration_audio_path.is_empty() {
                    Some((
                        "no narration audio has been generated".to_string(),
                        Some("run \"Narration audio\" first".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::WordTimings => {
                if state.word_timings.is_empty() {
                    Some((
                        "no narration timings available".to_string(),
                        Some("run \"Timestamps\" first".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::SceneList => {
                if state.scenes.is_empty() {
                    Some((
                        "the scene list is empty".to_string(),
                        Some("run \"Scene breakdown\" first".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::SceneImagesReady => {
                let missing = state
                    .scenes
                    .iter()
                    .filter(|s| s.image_url.is_empty())
                    .count();
                if state.scenes.is_empty() {
                    Some((
                        "the scene list is empty".to_string(),
                        Some("run \"Scene breakdown\" first".to_string()),
                    ))
                } else if missing > 0 {
                    Some((
                        format!("{missing} scene(s) have no image yet"),
                        Some("run \"Scene images\" first".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::SceneVideosReady => {
                let missing = state
                    .scenes
                    .iter()
                    .filter(|s| s.video_url.is_empty())
                    .count();
                if state.scenes.is_empty() {
                    Some((
                        "the scene list is empty".to_string(),
                        Some("run \"Scene breakdown\" first".to_string()),
                    ))
                } else if missing > 0 {
                    Some((
                        format!("{missing} scene(s) have no video clip yet"),
                        Some("run \"Scene videos\" first".to_string()),
                    ))
                } else {
                    None
                }
            }
            InputRequirement::VoiceSelected => {
                if state.models.voice_id.is_empty() {
                    Some(("no voice selected; the default narrator voice will be used".to_string(), None))
                } else {
                    None
                }
            }
            InputRequirement::ReferenceImage => {
                if state.reference_image_url.is_empty() {
                    Some((
                        "no reference image; scene images may lack visual consistency".to_string(),
                        None,
                    ))
                } else {
                    None
                }
            }
        }
    }
}

/// Static declaration of one pipeline step.
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    pub id: StepId,
    pub domain: StepDomain,

    /// Unmet requirements block execution of this step.
    pub requires: &'static [InputRequirement],

    /// Unmet recommendations produce warnings only.
    pub recommends: &'static [InputRequirement],
}

const TOPIC_ONLY: &[InputRequirement] = &[InputRequirement::Topic];

static SPECS: [StepSpec; StepId::COUNT] = [
    StepSpec {
        id: StepId::ResearchTopic,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::TitleIdeas,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::Hook,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::Outline,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::ScriptDraft,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::ScriptPolish,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::NarrationMarkup,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::ImageStyleGuide,
        domain: StepDomain::Batch,
        requires: TOPIC_ONLY,
        recommends: &[],
    },
    StepSpec {
        id: StepId::NarrationAudio,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::StepResponse(StepId::NarrationMarkup)],
        recommends: &[InputRequirement::VoiceSelected],
    },
    StepSpec {
        id: StepId::Timestamps,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::NarrationAudio],
        recommends: &[],
    },
    StepSpec {
        id: StepId::SceneBreakdown,
        domain: StepDomain::Dispatched,
        requires: &[
            InputRequirement::StepResponse(StepId::ScriptPolish),
            InputRequirement::WordTimings,
        ],
        recommends: &[],
    },
    StepSpec {
        id: StepId::ReferenceImage,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::StepResponse(StepId::ImageStyleGuide)],
        recommends: &[],
    },
    StepSpec {
        id: StepId::SceneImages,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::SceneList],
        recommends: &[InputRequirement::ReferenceImage],
    },
    StepSpec {
        id: StepId::SceneVideos,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::SceneImagesReady],
        recommends: &[],
    },
    StepSpec {
        id: StepId::AssembleVideo,
        domain: StepDomain::Dispatched,
        requires: &[
            InputRequirement::SceneVideosReady,
            InputRequirement::NarrationAudio,
        ],
        recommends: &[],
    },
    StepSpec {
        id: StepId::Thumbnail,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::StepResponse(StepId::TitleIdeas)],
        recommends: &[],
    },
    StepSpec {
        id: StepId::VideoMetadata,
        domain: StepDomain::Dispatched,
        requires: &[InputRequirement::StepResponse(StepId::ScriptPolish)],
        recommends: &[],
    },
];

/// Look up the registry entry for a step.
pub fn spec(id: StepId) -> &'static StepSpec {
    &SPECS[id.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_step_in_order() {
        for (i, step_spec) in SPECS.iter().enumerate() {
            assert_eq!(step_spec.id.index(), i);
            assert_eq!(step_spec.domain, step_spec.id.domain());
        }
    }

    #[test]
    fn test_batch_steps_require_only_topic() {
        for id in StepId::batch_steps() {
            assert_eq!(spec(*id).requires, TOPIC_ONLY);
        }
    }

    #[test]
    fn test_topic_requirement() {
        let mut state = PipelineState::new();
        assert!(InputRequirement::Topic.check(&state).is_some());

        state.set_topic("   ");
        assert!(InputRequirement::Topic.check(&state).is_some());

        state.set_topic("Black holes");
        assert!(InputRequirement::Topic.check(&state).is_none());
    }

    #[test]
    fn test_step_response_requirement() {
        let mut state = PipelineState::new();
        let requirement = InputRequirement::StepResponse(StepId::ScriptPolish);
        let (message, hint) = requirement.check(&state).expect("unmet");
        assert!(message.contains("Script polish"));
        assert!(hint.is_some());

        state.step_mut(StepId::ScriptPolish).response = "final script".to_string();
        assert!(requirement.check(&state).is_none());
    }

    #[test]
    fn test_scene_images_requirement_counts_missing() {
        let mut state = PipelineState::new();
        state.scenes.push(vf_protocol::SceneAsset::new(
            1,
            vf_protocol::TimeRange::default(),
        ));
        state.scenes.push(vf_protocol::SceneAsset::new(
            2,
            vf_protocol::TimeRange::default(),
        ));
        state.scenes[0].image_url = "img-1.png".to_string();

        let (message, _) = InputRequirement::SceneImagesReady
            .check(&state)
            .expect("unmet");
        assert!(message.contains('1'));

        state.scenes[1].image_url = "img-2.png".to_string();
        assert!(InputRequirement::SceneImagesReady.check(&state).is_none());
    }
}
