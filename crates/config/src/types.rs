//! Value types shared by the config file, environment overrides and CLI flags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a textual setting cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    what: &'static str,
    value: String,
}

impl InvalidValue {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.what, self.value)
    }
}

impl std::error::Error for InvalidValue {}

/// Video bitrate, stored as kilobits per second
///
/// Accepts the encoder's rate grammar: "4M", "1.5M", "2500k" or a plain
/// bits-per-second integer. Renders back in the most compact form the
/// encoder accepts ("1.5M", "3M", "1234k").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitrate(u64);

impl Bitrate {
    pub fn from_kbps(kbps: u64) -> Self {
        Bitrate(kbps)
    }

    pub fn kbps(&self) -> u64 {
        self.0
    }

    /// Twice this rate; used to derive the rate-control buffer size
    pub fn doubled(&self) -> Self {
        Bitrate(self.0.saturating_mul(2))
    }
}

impl FromStr for Bitrate {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(InvalidValue::new("bitrate", s));
        }
        // Suffix decides the unit: M = megabits, k = kilobits, bare = bits.
        let (digits, kbps_per_unit) = match trimmed.as_bytes()[trimmed.len() - 1] {
            b'M' | b'm' => (&trimmed[..trimmed.len() - 1], 1000.0),
            b'K' | b'k' => (&trimmed[..trimmed.len() - 1], 1.0),
            _ => (trimmed, 0.001),
        };
        let value: f64 = digits
            .parse()
            .map_err(|_| InvalidValue::new("bitrate", s))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(InvalidValue::new("bitrate", s));
        }
        let kbps = (value * kbps_per_unit).round() as u64;
        if kbps == 0 {
            return Err(InvalidValue::new("bitrate", s));
        }
        Ok(Bitrate(kbps))
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}M", self.0 / 1000)
        } else if self.0 % 100 == 0 {
            write!(f, "{}.{}M", self.0 / 1000, (self.0 % 1000) / 100)
        } else {
            write!(f, "{}k", self.0)
        }
    }
}

impl TryFrom<String> for Bitrate {
    type Error = InvalidValue;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Bitrate> for String {
    fn from(b: Bitrate) -> String {
        b.to_string()
    }
}

/// Target output resolution
///
/// Parsed from either a height shorthand ("720p", width derived at 16:9
/// with integer division, so "480p" is 853x480) or an explicit "WxH".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if let Some(height) = trimmed.strip_suffix('p') {
            let height: u32 = height
                .parse()
                .map_err(|_| InvalidValue::new("resolution", s))?;
            if height == 0 {
                return Err(InvalidValue::new("resolution", s));
            }
            let width = (height as u64 * 16 / 9) as u32;
            Ok(Resolution { width, height })
        } else if let Some((w, h)) = trimmed.split_once('x') {
            let width: u32 = w.parse().map_err(|_| InvalidValue::new("resolution", s))?;
            let height: u32 = h.parse().map_err(|_| InvalidValue::new("resolution", s))?;
            if width == 0 || height == 0 {
                return Err(InvalidValue::new("resolution", s));
            }
            Ok(Resolution { width, height })
        } else {
            Err(InvalidValue::new("resolution", s))
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl TryFrom<String> for Resolution {
    type Error = InvalidValue;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Resolution> for String {
    fn from(r: Resolution) -> String {
        r.to_string()
    }
}

/// x264 speed/efficiency preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Medium
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ultrafast" => Ok(Preset::Ultrafast),
            "superfast" => Ok(Preset::Superfast),
            "veryfast" => Ok(Preset::Veryfast),
            "faster" => Ok(Preset::Faster),
            "fast" => Ok(Preset::Fast),
            "medium" => Ok(Preset::Medium),
            "slow" => Ok(Preset::Slow),
            "slower" => Ok(Preset::Slower),
            "veryslow" => Ok(Preset::Veryslow),
            _ => Err(InvalidValue::new("preset", s)),
        }
    }
}

/// H.264 profile tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Baseline,
    Main,
    High,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Baseline => "baseline",
            Profile::Main => "main",
            Profile::High => "high",
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::High
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(Profile::Baseline),
            "main" => Ok(Profile::Main),
            "high" => Ok(Profile::High),
            _ => Err(InvalidValue::new("profile", s)),
        }
    }
}

/// x264 content tuning hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tune {
    Film,
    Animation,
    Grain,
    FastDecode,
    ZeroLatency,
}

impl Tune {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tune::Film => "film",
            Tune::Animation => "animation",
            Tune::Grain => "grain",
            Tune::FastDecode => "fastdecode",
            Tune::ZeroLatency => "zerolatency",
        }
    }
}

impl fmt::Display for Tune {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tune {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "film" => Ok(Tune::Film),
            "animation" => Ok(Tune::Animation),
            "grain" => Ok(Tune::Grain),
            "fastdecode" => Ok(Tune::FastDecode),
            "zerolatency" => Ok(Tune::ZeroLatency),
            _ => Err(InvalidValue::new("tune", s)),
        }
    }
}
