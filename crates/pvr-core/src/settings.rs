//! Per-channel video and audio playback settings.

use serde::{Deserialize, Serialize};

/// Playback settings remembered per channel.
///
/// The defaults are the player's global defaults; only settings that differ
/// from them are worth persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
    pub sharpness: f32,
    pub noise_reduction: f32,
    pub custom_zoom_amount: f32,
    pub custom_pixel_ratio: f32,
    pub custom_vertical_shift: f32,
    pub view_mode: u32,
    pub deinterlace_mode: u32,
    pub interlace_method: u32,
    pub scaling_method: u32,
    /// Audio delay in seconds
    pub audio_delay: f32,
    /// Selected audio stream, -1 for the backend's default
    pub audio_stream: i32,
    pub subtitle_on: bool,
    /// Selected subtitle stream, -1 for none
    pub subtitle_stream: i32,
    /// Subtitle delay in seconds
    pub subtitle_delay: f32,
    pub output_to_all_speakers: bool,
    pub post_process: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            brightness: 50.0,
            contrast: 50.0,
            gamma: 20.0,
            sharpness: 0.0,
            noise_reduction: 0.0,
            custom_zoom_amount: 1.0,
            custom_pixel_ratio: 1.0,
            custom_vertical_shift: 0.0,
            view_mode: 0,
            deinterlace_mode: 0,
            interlace_method: 0,
            scaling_method: 0,
            audio_delay: 0.0,
            audio_stream: -1,
            subtitle_on: true,
            subtitle_stream: -1,
            subtitle_delay: 0.0,
            output_to_all_speakers: false,
            post_process: false,
        }
    }
}

impl VideoSettings {
    /// Returns true if every field equals the global default.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
