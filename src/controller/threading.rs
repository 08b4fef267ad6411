//! Threading presets: a tagged enum over a data table, rather than a
//! string-keyed lookup, for the handful of millisecond parameters that
//! govern worker pacing.

/// Millisecond parameters for one threading preset. Only `status_query_ms`
/// and `tx_short_ms` are consumed by this core; the rest are carried for
/// completeness of the table and for collaborators pacing their own
/// RX-side work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThreadingParams {
    pub status_query_ms: u64,
    pub tx_long_ms: u64,
    pub tx_short_ms: u64,
    pub rx_long_ms: u64,
    pub rx_short_ms: u64,
}

/// One of the four threading presets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingModePreset {
    Slow,
    Quiet,
    Fast,
    UltraFast,
}

impl ThreadingModePreset {
    pub fn params(self) -> ThreadingParams {
        match self {
            ThreadingModePreset::Slow => ThreadingParams {
                status_query_ms: 2000,
                tx_long_ms: 15,
                tx_short_ms: 4,
                rx_long_ms: 2,
                rx_short_ms: 1,
            },
            ThreadingModePreset::Quiet => ThreadingParams {
                status_query_ms: 1000,
                tx_long_ms: 10,
                tx_short_ms: 2,
                rx_long_ms: 1,
                rx_short_ms: 1,
            },
            ThreadingModePreset::Fast => ThreadingParams {
                status_query_ms: 500,
                tx_long_ms: 5,
                tx_short_ms: 1,
                rx_long_ms: 1,
                rx_short_ms: 0,
            },
            ThreadingModePreset::UltraFast => ThreadingParams {
                status_query_ms: 250,
                tx_long_ms: 1,
                tx_short_ms: 0,
                rx_long_ms: 1,
                rx_short_ms: 0,
            },
        }
    }

    /// Looks up a preset by name, for collaborators that surface preset
    /// choice as a string (e.g. a settings dropdown).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Slow" => Some(ThreadingModePreset::Slow),
            "Quiet" => Some(ThreadingModePreset::Quiet),
            "Fast" => Some(ThreadingModePreset::Fast),
            "UltraFast" => Some(ThreadingModePreset::UltraFast),
            _ => None,
        }
    }
}

impl Default for ThreadingModePreset {
    fn default() -> Self {
        ThreadingModePreset::Fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fast() {
        assert_eq!(ThreadingModePreset::default(), ThreadingModePreset::Fast);
    }

    #[test]
    fn fast_params_match_table() {
        let p = ThreadingModePreset::Fast.params();
        assert_eq!(p.status_query_ms, 500);
        assert_eq!(p.tx_short_ms, 1);
    }

    #[test]
    fn from_name_round_trips() {
        assert_eq!(
            ThreadingModePreset::from_name("UltraFast"),
            Some(ThreadingModePreset::UltraFast)
        );
        assert_eq!(ThreadingModePreset::from_name("bogus"), None);
    }
}
