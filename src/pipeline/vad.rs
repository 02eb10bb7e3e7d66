//! Energy-threshold voice activity detection with hangover smoothing, so a
//! single quiet frame mid-sentence doesn't register as an endpoint.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silent,
    Speaking,
}

#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// RMS amplitude (0..=i16::MAX) above which a frame counts as speech.
    pub energy_threshold: f32,
    /// Consecutive silent frames required before declaring an endpoint.
    pub hangover_frames: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 500.0,
            hangover_frames: 15,
        }
    }
}

pub struct VadDetector {
    config: VadConfig,
    state: VadState,
    silent_run: u32,
}

impl VadDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Silent,
            silent_run: 0,
        }
    }

    /// Feeds one frame of 16-bit PCM samples; returns `Some` when the
    /// detector's state changes.
    pub fn process_frame(&mut self, samples: &[i16]) -> Option<VadState> {
        let is_speech = rms(samples) >= self.config.energy_threshold;

        match self.state {
            VadState::Silent if is_speech => {
                self.state = VadState::Speaking;
                self.silent_run = 0;
                Some(VadState::Speaking)
            }
            VadState::Speaking if is_speech => {
                self.silent_run = 0;
                None
            }
            VadState::Speaking => {
                self.silent_run += 1;
                if self.silent_run >= self.config.hangover_frames {
                    self.state = VadState::Silent;
                    self.silent_run = 0;
                    Some(VadState::Silent)
                } else {
                    None
                }
            }
            VadState::Silent => None,
        }
    }
}

fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / samples.len() as f64).sqrt()) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_stays_silent() {
        let mut detector = VadDetector::new(VadConfig::default());
        assert_eq!(detector.process_frame(&[0; 160]), None);
    }

    #[test]
    fn loud_frame_triggers_speaking() {
        let mut detector = VadDetector::new(VadConfig::default());
        let loud = vec![3000i16; 160];
        assert_eq!(detector.process_frame(&loud), Some(VadState::Speaking));
    }

    #[test]
    fn hangover_delays_endpoint() {
        let config = VadConfig {
            energy_threshold: 500.0,
            hangover_frames: 2,
        };
        let mut detector = VadDetector::new(config);
        let loud = vec![3000i16; 160];
        let silent = vec![0i16; 160];

        assert_eq!(detector.process_frame(&loud), Some(VadState::Speaking));
        assert_eq!(detector.process_frame(&silent), None);
        assert_eq!(detector.process_frame(&silent), Some(VadState::Silent));
    }
}
