use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "filterpicker_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

pub mod names {
    pub const METRIC_NAME_PREFIX: &str = "filterpicker_";

    pub const FAILURES: &str = "filterpicker_failures";
    pub const SAMPLES_PROCESSED: &str = "filterpicker_samples_processed";
    pub const BLOCKS_PROCESSED: &str = "filterpicker_blocks_processed";
    pub const PICKS_EMITTED: &str = "filterpicker_picks_emitted";
}

pub mod picks_emitted {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum PolarityKind {
        Positive,
        Negative,
        Unknown,
    }

    // Label building function
    pub fn get_label(polarity: PolarityKind) -> (&'static str, &'static str) {
        (
            "polarity",
            match polarity {
                PolarityKind::Positive => "positive",
                PolarityKind::Negative => "negative",
                PolarityKind::Unknown => "unknown",
            },
        )
    }
}

pub mod failures {
    #[derive(Debug, Clone, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        InvalidSample,
        StreamRejected,
        FileWriteFailed,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::InvalidSample => "invalid_sample",
                FailureKind::StreamRejected => "stream_rejected",
                FailureKind::FileWriteFailed => "file_write_failed",
            },
        )
    }
}
