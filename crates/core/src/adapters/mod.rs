//! Step adapters: one executor per external generation concern.

pub mod assembly;
pub mod audio;
pub mod base;
pub mod batch;
pub mod reference_image;
pub mod scene_images;
pub mod scene_videos;
pub mod text_step;
pub mod thumbnail;
pub mod timestamps;

pub use assembly::AssemblyAdapter;
pub use audio::NarrationAudioAdapter;
pub use base::{AdapterError, StepAdapter, StepContext};
pub use batch::BatchAdapter;
pub use reference_image::ReferenceImageAdapter;
pub use scene_images::SceneImagesAdapter;
pub use scene_videos::SceneVideosAdapter;
pub use text_step::TextStepAdapter;
pub use thumbnail::ThumbnailAdapter;
pub use timestamps::TimestampsAdapter;
