#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

#[macro_use]
mod macros;

mod opts;
pub use opts::{Opts, UnstableOpts};

/// The version of the GASOL crates.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

option_enum! {
    /// A version specifier of the EVM we want to emit code for.
    ///
    /// Only affects how constants are pushed.
    #[derive(Default)]
    #[strum(serialize_all = "camelCase")]
    pub enum EvmVersion {
        // NOTE: Order matters.
        Homestead,
        TangerineWhistle,
        SpuriousDragon,
        Byzantium,
        Constantinople,
        Petersburg,
        Istanbul,
        Berlin,
        London,
        Paris,
        Shanghai,
        #[default]
        Cancun,
        Prague,
    }
}

impl EvmVersion {
    pub fn has_push0(self) -> bool {
        self >= Self::Shanghai
    }
}

option_enum! {
    /// How results are printed.
    #[derive(Default)]
    #[derive(strum::EnumIs)]
    #[strum(serialize_all = "lowercase")]
    pub enum OutputFormat {
        /// One line of opcodes and one line of ids per block.
        #[default]
        Text,
        /// One JSON object per block.
        Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn string_enum() {
        for value in EvmVersion::iter() {
            let s = value.as_str();
            assert_eq!(value.to_string(), s);
            assert_eq!(value, s.parse().unwrap());
        }
        assert_eq!("tangerineWhistle".parse::<EvmVersion>().unwrap(), EvmVersion::TangerineWhistle);
        assert_eq!(OutputFormat::Json.as_str(), "json");
        assert_eq!(EvmVersion::ALL.len(), EvmVersion::iter().count());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn serde_enum() {
        for value in OutputFormat::iter() {
            let json_s = format!("\"{value}\"");
            assert_eq!(serde_json::to_string(&value).unwrap(), json_s);
            assert_eq!(serde_json::from_str::<OutputFormat>(&json_s).unwrap(), value);
        }
        let err = serde_json::from_str::<EvmVersion>("\"frontier\"").unwrap_err().to_string();
        assert!(err.contains("unknown variant `frontier`"), "{err}");
    }

    #[test]
    fn push0() {
        assert!(!EvmVersion::London.has_push0());
        assert!(EvmVersion::Shanghai.has_push0());
        assert!(EvmVersion::default().has_push0());
    }
}
