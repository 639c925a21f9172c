//! Reader for the JSON files emitted by the SFS builder.

use crate::{BlockMeta, NewOp, Sfs, SfsBuilder, SfsError, U256, ValueId};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct RawSfs {
    src_ws: Vec<RawItem>,
    tgt_ws: Vec<RawItem>,
    #[serde(default)]
    user_instrs: Vec<RawInstr>,
    #[serde(default)]
    memory_dependences: Vec<(String, String)>,
    #[serde(default)]
    storage_dependences: Vec<(String, String)>,
    #[serde(default)]
    current_cost: Option<u64>,
    #[serde(default)]
    init_progr_len: Option<u64>,
    #[serde(default)]
    max_sk_sz: Option<u64>,
    #[serde(default)]
    original_instrs: Option<String>,
}

#[derive(Deserialize)]
struct RawInstr {
    id: String,
    disasm: String,
    #[serde(default)]
    opcode: String,
    #[serde(default)]
    inpt_sk: Vec<RawItem>,
    #[serde(default)]
    outpt_sk: Vec<RawItem>,
    #[serde(default)]
    gas: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    commutative: bool,
    #[serde(default)]
    storage: bool,
    #[serde(default)]
    value: Vec<RawItem>,
}

/// A stack entry: a number is always a literal, a string is a literal only if it is numeric.
///
/// Numbers keep their full text, so literals wider than 64 bits survive parsing.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Num(serde_json::Number),
    Str(String),
}

impl RawItem {
    fn intern(&self, b: &mut SfsBuilder) -> Result<ValueId, SfsError> {
        match self {
            Self::Num(n) => {
                let text = n.as_str();
                let value = text
                    .parse::<U256>()
                    .ok()
                    .filter(|_| text.bytes().all(|c| c.is_ascii_digit()))
                    .ok_or_else(|| SfsError::InvalidLiteral(text.to_string()))?;
                Ok(b.lit(value))
            }
            Self::Str(s) => Ok(b.token(s)),
        }
    }

    fn into_token(self) -> String {
        match self {
            Self::Num(n) => n.as_str().to_string(),
            Self::Str(s) => s,
        }
    }
}

fn intern_all(items: &[RawItem], b: &mut SfsBuilder) -> Result<Vec<ValueId>, SfsError> {
    items.iter().map(|item| item.intern(b)).collect()
}

impl Sfs {
    /// Parses an SFS from its JSON representation.
    pub fn from_json_str(s: &str) -> Result<Self, SfsError> {
        let raw: RawSfs = serde_json::from_str(s)?;
        Self::from_raw(raw)
    }

    /// Parses an SFS from an already decoded JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SfsError> {
        let raw: RawSfs = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    /// Reads and parses an SFS file.
    pub fn from_json_file(path: &Path) -> Result<Self, SfsError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| SfsError::ReadFile(path.to_path_buf(), e))?;
        Self::from_json_str(&s)
    }

    fn from_raw(raw: RawSfs) -> Result<Self, SfsError> {
        let mut b = SfsBuilder::new();
        let src = intern_all(&raw.src_ws, &mut b)?;
        let tgt = intern_all(&raw.tgt_ws, &mut b)?;
        b.src(src).tgt(tgt).meta(BlockMeta {
            current_cost: raw.current_cost,
            init_progr_len: raw.init_progr_len,
            max_sk_sz: raw.max_sk_sz,
            original_instrs: raw.original_instrs,
        });

        for instr in raw.user_instrs {
            let inputs = intern_all(&instr.inpt_sk, &mut b)?;
            let outputs = intern_all(&instr.outpt_sk, &mut b)?;
            b.op(NewOp {
                name: instr.id,
                mnemonic: instr.disasm,
                opcode: instr.opcode,
                inputs,
                outputs,
                commutative: instr.commutative,
                storage: instr.storage,
                gas: instr.gas,
                size: instr.size,
                push_value: instr.value.into_iter().map(RawItem::into_token).collect(),
            })?;
        }
        for (before, after) in &raw.memory_dependences {
            b.memory_dep(before, after)?;
        }
        for (before, after) in &raw.storage_dependences {
            b.storage_dep(before, after)?;
        }

        let sfs = b.build()?;
        tracing::debug!(
            ops = sfs.ops.len(),
            values = sfs.values.len(),
            src = sfs.src.len(),
            tgt = sfs.tgt.len(),
            "read SFS"
        );
        Ok(sfs)
    }
}

#[cfg(test)]
mod tests {
    use crate::{OpKind, Sfs, SfsError, U256, Value};

    const ADD_BLOCK: &str = r#"{
        "init_progr_len": 3,
        "max_sk_sz": 3,
        "vars": ["s(0)", "s(1)", "s(2)"],
        "src_ws": ["s(0)", "s(1)"],
        "tgt_ws": ["s(2)", 7],
        "user_instrs": [
            {
                "id": "ADD_0",
                "opcode": "01",
                "disasm": "ADD",
                "inpt_sk": ["s(0)", "s(1)"],
                "outpt_sk": ["s(2)"],
                "gas": 3,
                "commutative": true,
                "storage": false,
                "size": 1
            },
            {
                "id": "PUSH [tag]_0",
                "opcode": "60",
                "disasm": "PUSH [tag]",
                "inpt_sk": [],
                "outpt_sk": ["s(3)"],
                "gas": 3,
                "size": 2,
                "value": [12]
            }
        ],
        "current_cost": 3,
        "storage_dependences": [],
        "memory_dependences": [],
        "rules": ""
    }"#;

    #[test]
    fn test_read_block() {
        let sfs = Sfs::from_json_str(ADD_BLOCK).unwrap();
        assert_eq!(sfs.src.len(), 2);
        assert_eq!(sfs.tgt.len(), 2);
        assert_eq!(sfs.value(sfs.tgt[1]), &Value::Lit(U256::from(7)));
        assert_eq!(sfs.meta.current_cost, Some(3));

        let add = sfs.op(sfs.op_by_name("ADD_0").unwrap());
        assert_eq!(add.kind, OpKind::Pure { commutative: true });
        assert_eq!(add.inputs.as_slice(), &sfs.src[..]);
        assert_eq!(add.output, Some(sfs.tgt[0]));

        let tag = sfs.op(sfs.op_by_name("PUSH [tag]_0").unwrap());
        assert_eq!(tag.kind, OpKind::Nullary);
        assert_eq!(tag.push_value, ["12"]);
        assert!(tag.is_small_nullary());
    }

    #[test]
    fn test_unknown_dependence() {
        let json = r#"{
            "src_ws": [], "tgt_ws": [],
            "user_instrs": [],
            "storage_dependences": [["SSTORE_0", "SSTORE_1"]]
        }"#;
        let err = Sfs::from_json_str(json).unwrap_err();
        assert!(matches!(err, SfsError::UnknownOp(name) if name == "SSTORE_0"));
    }

    #[test]
    fn test_wide_literals() {
        let json = r#"{
            "src_ws": ["x"],
            "tgt_ws": ["s(0)", 115792089237316195423570985008687907853269984665640564039457584007913129639935],
            "user_instrs": [{
                "id": "AND_0",
                "disasm": "AND",
                "inpt_sk": ["x", 1461501637330902918203684832716283019655932542975],
                "outpt_sk": ["s(0)"],
                "gas": 3,
                "size": 1,
                "commutative": true
            }]
        }"#;
        let sfs = Sfs::from_json_str(json).unwrap();
        let mask = (U256::from(1) << 160) - U256::from(1);
        let and = sfs.op(sfs.op_by_name("AND_0").unwrap());
        assert_eq!(sfs.value(and.inputs[1]), &Value::Lit(mask));
        assert_eq!(sfs.value(sfs.tgt[1]), &Value::Lit(U256::MAX));

        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        let sfs = Sfs::from_json_value(value).unwrap();
        assert_eq!(sfs.value(sfs.tgt[1]), &Value::Lit(U256::MAX));
    }

    #[test]
    fn test_invalid_literals() {
        for item in ["-1", "1.5", "1e3"] {
            let json = format!(r#"{{ "src_ws": [{item}], "tgt_ws": [] }}"#);
            let err = Sfs::from_json_str(&json).unwrap_err();
            assert!(matches!(&err, SfsError::InvalidLiteral(text) if text == item), "{err}");
        }
        let json = r#"{ "src_ws": [115792089237316195423570985008687907853269984665640564039457584007913129639936], "tgt_ws": [] }"#;
        assert!(matches!(Sfs::from_json_str(json), Err(SfsError::InvalidLiteral(_))));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(Sfs::from_json_str("{"), Err(SfsError::Json(_))));
        assert!(matches!(Sfs::from_json_str(r#"{"src_ws": []}"#), Err(SfsError::Json(_))));
    }
}
