//! Minimal driver used to exercise the registry.

use crate::driver::{Outlet, OutletDriver, ParameterSpec};
use crate::record::{OutletRecord, RecordError};

#[derive(Debug)]
pub(crate) struct BenchRelay {
    pub(crate) channel: i64,
    pub(crate) label: String,
}

impl Outlet for BenchRelay {
    fn type_tag(&self) -> &'static str {
        Self::TYPE
    }

    fn serialize(&self) -> OutletRecord {
        OutletRecord::typed(Self::TYPE)
            .with("channel", self.channel)
            .with("label", self.label.as_str())
    }

    fn get_state(&self) -> Option<bool> {
        None
    }

    fn set_state(&self, _state: bool) {}
}

impl OutletDriver for BenchRelay {
    const TYPE: &'static str = "bench-relay";
    const PARAMETERS: &'static [ParameterSpec] = &[
        ParameterSpec::required("channel", "Relay channel between 1 and 4"),
        ParameterSpec::optional("label", "Free-form label", "bench"),
    ];

    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError> {
        Ok(Self {
            channel: record.require_integer_in("channel", 1..=4)?,
            label: record.text_or("label", "bench")?.to_owned(),
        })
    }
}
