//! Pure encode planning from probed metadata and configured targets

use crate::probe::MediaInfo;
use mkv2mp4_config::{Bitrate, EncodeTargets};

/// Concrete encoder parameters for one conversion attempt
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    /// Scale the video down to (width, height)
    pub downscale: bool,
    /// Effective output width (target when downscaling, else source)
    pub width: u32,
    /// Effective output height
    pub height: u32,
    /// Rate ceiling; None means no rate control
    pub maxrate: Option<Bitrate>,
    /// Rate-control buffer; defined exactly when maxrate is
    pub bufsize: Option<Bitrate>,
    /// False means the video stream is copied into the new container untouched
    pub reencode_video: bool,
}

/// Streaming bitrate ceiling by output height
///
/// Policy constants, not a formula: SD content streams fine at 1.5 Mbps,
/// 4K needs 8 Mbps.
pub fn recommended_bitrate(height: u32) -> Bitrate {
    if height <= 480 {
        Bitrate::from_kbps(1500)
    } else if height <= 720 {
        Bitrate::from_kbps(2500)
    } else if height <= 1080 {
        Bitrate::from_kbps(4000)
    } else {
        Bitrate::from_kbps(8000)
    }
}

/// Derive the encoder parameters for one source file
///
/// Downscaling is one-directional: it applies only when the source height
/// exceeds a requested resolution cap. A rate ceiling applies when given
/// explicitly, when downscaling, or when no resolution cap was requested at
/// all; a file already inside a requested cap keeps its original rate and
/// its video stream is copied unchanged.
pub fn plan(info: &MediaInfo, targets: &EncodeTargets) -> EncodePlan {
    let downscale = matches!(&targets.resolution, Some(r) if info.height > r.height);

    let (width, height) = match (&targets.resolution, downscale) {
        (Some(r), true) => (r.width, r.height),
        _ => (info.width, info.height),
    };

    let maxrate = targets.maxrate.or_else(|| {
        if downscale || targets.resolution.is_none() {
            Some(recommended_bitrate(height))
        } else {
            None
        }
    });

    let bufsize = maxrate.map(|rate| targets.bufsize.unwrap_or_else(|| rate.doubled()));

    EncodePlan {
        downscale,
        width,
        height,
        maxrate,
        bufsize,
        reencode_video: downscale || maxrate.is_some(),
    }
}
