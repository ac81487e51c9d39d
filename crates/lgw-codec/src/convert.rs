//! Schema-checked conversion between JSON and wire values.
//!
//! Two JSON dialects meet here. The canonical dialect is what `serde` sees
//! for Rust payload types (Int64 as a JSON number). The ledger dialect is
//! what the JSON Ledger API and the active-contracts projection carry (Int64
//! as a decimal string). Input accepts both spellings of Int64; output picks
//! one per dialect.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, CodecResult};
use crate::schema::{Field, Type, MAX_NUMERIC_SCALE, NUMERIC_PRECISION};
use crate::value::{format_date, format_timestamp, parse_date, parse_timestamp, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dialect {
    Canonical,
    Ledger,
}

impl Type {
    /// Convert JSON into a wire value conforming to this type.
    ///
    /// Accepts both the canonical and the ledger dialect. Missing
    /// non-optional fields, unknown fields, unknown constructors, and
    /// out-of-range scalars are errors; nothing is silently dropped.
    pub fn encode(&self, json: &Json) -> CodecResult<Value> {
        encode_at(self, json, &mut Path::root())
    }

    /// Convert a wire value into canonical JSON, checking it against this type.
    pub fn decode(&self, value: &Value) -> CodecResult<Json> {
        decode_at(self, value, Dialect::Canonical, &mut Path::root())
    }

    /// Convert a wire value into ledger-dialect JSON, checking it against this type.
    pub fn decode_ledger(&self, value: &Value) -> CodecResult<Json> {
        decode_at(self, value, Dialect::Ledger, &mut Path::root())
    }
}

struct Path(Vec<String>);

impl Path {
    fn root() -> Self {
        Self(Vec::new())
    }

    fn render(&self) -> String {
        let mut out = String::from("$");
        for seg in &self.0 {
            if seg.starts_with('[') {
                out.push_str(seg);
            } else {
                out.push('.');
                out.push_str(seg);
            }
        }
        out
    }

    fn with<T>(&mut self, seg: String, f: impl FnOnce(&mut Self) -> T) -> T {
        self.0.push(seg);
        let out = f(self);
        self.0.pop();
        out
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn mismatch(ty: &Type, json: &Json, path: &Path) -> CodecError {
    CodecError::TypeMismatch {
        path: path.render(),
        expected: ty.to_string(),
        found: json_kind(json).to_string(),
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> CodecError {
    CodecError::InvalidValue {
        path: path.render(),
        reason: reason.into(),
    }
}

fn encode_at(ty: &Type, json: &Json, path: &mut Path) -> CodecResult<Value> {
    match (ty, json) {
        (Type::Unit, Json::Object(map)) if map.is_empty() => Ok(Value::Unit),
        (Type::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
        (Type::Int64, Json::Number(n)) => n
            .as_i64()
            .map(Value::Int64)
            .ok_or_else(|| invalid(path, format!("{n} is not a 64-bit integer"))),
        (Type::Int64, Json::String(s)) => s
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|_| invalid(path, format!("{s:?} is not a 64-bit integer"))),
        (Type::Numeric { scale }, Json::String(s)) => {
            check_numeric(s, *scale, path)?;
            Ok(Value::Numeric(s.clone()))
        }
        (Type::Numeric { scale }, Json::Number(n)) => {
            let s = n.to_string();
            check_numeric(&s, *scale, path)?;
            Ok(Value::Numeric(s))
        }
        (Type::Text, Json::String(s)) => Ok(Value::Text(s.clone())),
        (Type::Party, Json::String(s)) => {
            if s.is_empty() {
                return Err(invalid(path, "party must not be empty"));
            }
            Ok(Value::Party(s.clone()))
        }
        (Type::ContractId, Json::String(s)) => {
            if s.is_empty() {
                return Err(invalid(path, "contract id must not be empty"));
            }
            Ok(Value::ContractId(s.clone()))
        }
        (Type::Timestamp, Json::String(s)) => parse_timestamp(s)
            .map(Value::Timestamp)
            .map_err(|reason| invalid(path, reason)),
        (Type::Date, Json::String(s)) => parse_date(s)
            .map(Value::Date)
            .map_err(|reason| invalid(path, reason)),
        (Type::Optional(_), Json::Null) => Ok(Value::none()),
        (Type::Optional(inner), json) => encode_optional_some(inner, json, path),
        (Type::List(inner), Json::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| path.with(format!("[{i}]"), |p| encode_at(inner, item, p)))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::List),
        (Type::TextMap(inner), Json::Object(map)) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                let value = path.with(k.clone(), |p| encode_at(inner, v, p))?;
                out.insert(k.clone(), value);
            }
            Ok(Value::TextMap(out))
        }
        (Type::Record(fields), Json::Object(map)) => encode_record(fields, map, path),
        (Type::Variant(constructors), Json::Object(map)) => {
            encode_variant(constructors, map, path)
        }
        (Type::Enum(constructors), Json::String(s)) => {
            if constructors.iter().any(|c| c == s) {
                Ok(Value::Enum(s.clone()))
            } else {
                Err(CodecError::UnknownConstructor {
                    path: path.render(),
                    constructor: s.clone(),
                })
            }
        }
        (ty, json) => Err(mismatch(ty, json, path)),
    }
}

fn encode_optional_some(inner: &Type, json: &Json, path: &mut Path) -> CodecResult<Value> {
    if !matches!(inner, Type::Optional(_)) {
        return Ok(Value::some(encode_at(inner, json, path)?));
    }
    match json {
        Json::Array(items) if items.is_empty() => Ok(Value::some(Value::none())),
        Json::Array(items) if items.len() == 1 => {
            let nested = path.with("[0]".into(), |p| encode_at(inner, &items[0], p))?;
            Ok(Value::some(nested))
        }
        other => Err(invalid(
            path,
            format!("nested optional must be [] or [x], found {}", json_kind(other)),
        )),
    }
}

fn encode_record(fields: &[Field], map: &Map<String, Json>, path: &mut Path) -> CodecResult<Value> {
    let known: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    if let Some(extra) = map.keys().find(|k| !known.contains(k.as_str())) {
        return Err(CodecError::UnknownField {
            path: path.render(),
            field: extra.clone(),
        });
    }

    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let value = match map.get(&field.name) {
            Some(json) => path.with(field.name.clone(), |p| encode_at(&field.ty, json, p))?,
            None if matches!(field.ty, Type::Optional(_)) => Value::none(),
            None => {
                return Err(CodecError::MissingField {
                    path: path.render(),
                    field: field.name.clone(),
                })
            }
        };
        out.push((field.name.clone(), value));
    }
    Ok(Value::Record(out))
}

fn encode_variant(
    constructors: &[Field],
    map: &Map<String, Json>,
    path: &mut Path,
) -> CodecResult<Value> {
    let Some(Json::String(tag)) = map.get("tag") else {
        return Err(invalid(path, "variant requires a string \"tag\""));
    };
    if let Some(extra) = map.keys().find(|k| *k != "tag" && *k != "value") {
        return Err(CodecError::UnknownField {
            path: path.render(),
            field: extra.clone(),
        });
    }
    let Some(ctor) = constructors.iter().find(|c| &c.name == tag) else {
        return Err(CodecError::UnknownConstructor {
            path: path.render(),
            constructor: tag.clone(),
        });
    };
    let unit = Json::Object(Map::new());
    let payload = match (map.get("value"), &ctor.ty) {
        (Some(v), _) => v,
        (None, Type::Unit) => &unit,
        (None, _) => {
            return Err(CodecError::MissingField {
                path: path.render(),
                field: "value".into(),
            })
        }
    };
    let value = path.with(tag.clone(), |p| encode_at(&ctor.ty, payload, p))?;
    Ok(Value::Variant {
        constructor: tag.clone(),
        value: Box::new(value),
    })
}

fn check_numeric(s: &str, scale: u32, path: &Path) -> CodecResult<()> {
    if scale > MAX_NUMERIC_SCALE {
        return Err(invalid(
            path,
            format!("numeric scale {scale} exceeds the maximum of {MAX_NUMERIC_SCALE}"),
        ));
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let well_formed = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit())
        && !(digits.contains('.') && frac_part.is_empty());
    if !well_formed {
        return Err(invalid(path, format!("{s:?} is not a decimal literal")));
    }
    if frac_part.len() as u32 > scale {
        return Err(invalid(
            path,
            format!("{s} has more than {scale} fractional digits"),
        ));
    }
    let significant_int = int_part.trim_start_matches('0').len() as u32;
    let max_int = NUMERIC_PRECISION - scale;
    if significant_int > max_int {
        return Err(invalid(path, format!("{s} exceeds {max_int} integer digits")));
    }
    Ok(())
}

fn decode_mismatch(ty: &Type, value: &Value, path: &Path) -> CodecError {
    CodecError::TypeMismatch {
        path: path.render(),
        expected: ty.to_string(),
        found: format!("{value:?}").chars().take(48).collect(),
    }
}

fn decode_at(ty: &Type, value: &Value, dialect: Dialect, path: &mut Path) -> CodecResult<Json> {
    match (ty, value) {
        (Type::Unit, Value::Unit) => Ok(Json::Object(Map::new())),
        (Type::Bool, Value::Bool(b)) => Ok(Json::Bool(*b)),
        (Type::Int64, Value::Int64(i)) => Ok(match dialect {
            Dialect::Canonical => Json::Number(Number::from(*i)),
            Dialect::Ledger => Json::String(i.to_string()),
        }),
        (Type::Numeric { scale }, Value::Numeric(n)) => {
            check_numeric(n, *scale, path)?;
            Ok(Json::String(n.clone()))
        }
        (Type::Text, Value::Text(s))
        | (Type::Party, Value::Party(s))
        | (Type::ContractId, Value::ContractId(s)) => Ok(Json::String(s.clone())),
        (Type::Timestamp, Value::Timestamp(micros)) => format_timestamp(*micros)
            .map(Json::String)
            .ok_or_else(|| invalid(path, "timestamp out of range")),
        (Type::Date, Value::Date(days)) => format_date(*days)
            .map(Json::String)
            .ok_or_else(|| invalid(path, "date out of range")),
        (Type::Optional(_), Value::Optional(None)) => Ok(Json::Null),
        (Type::Optional(inner), Value::Optional(Some(v))) => {
            if let Type::Optional(_) = inner.as_ref() {
                match v.as_ref() {
                    Value::Optional(None) => Ok(Json::Array(Vec::new())),
                    nested => Ok(Json::Array(vec![path
                        .with("[0]".into(), |p| decode_at(inner, nested, dialect, p))?])),
                }
            } else {
                decode_at(inner, v, dialect, path)
            }
        }
        (Type::List(inner), Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| path.with(format!("[{i}]"), |p| decode_at(inner, item, dialect, p)))
            .collect::<CodecResult<Vec<_>>>()
            .map(Json::Array),
        (Type::TextMap(inner), Value::TextMap(entries)) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                let json = path.with(k.clone(), |p| decode_at(inner, v, dialect, p))?;
                map.insert(k.clone(), json);
            }
            Ok(Json::Object(map))
        }
        (Type::Record(fields), Value::Record(values)) => {
            if fields.len() != values.len() {
                return Err(invalid(
                    path,
                    format!("record has {} fields, schema declares {}", values.len(), fields.len()),
                ));
            }
            let mut map = Map::with_capacity(fields.len());
            for (field, (name, v)) in fields.iter().zip(values) {
                if &field.name != name {
                    return Err(CodecError::UnknownField {
                        path: path.render(),
                        field: name.clone(),
                    });
                }
                let json = path.with(name.clone(), |p| decode_at(&field.ty, v, dialect, p))?;
                map.insert(name.clone(), json);
            }
            Ok(Json::Object(map))
        }
        (Type::Variant(constructors), Value::Variant { constructor, value }) => {
            let Some(ctor) = constructors.iter().find(|c| &c.name == constructor) else {
                return Err(CodecError::UnknownConstructor {
                    path: path.render(),
                    constructor: constructor.clone(),
                });
            };
            let json = path.with(constructor.clone(), |p| decode_at(&ctor.ty, value, dialect, p))?;
            let mut map = Map::with_capacity(2);
            map.insert("tag".into(), Json::String(constructor.clone()));
            map.insert("value".into(), json);
            Ok(Json::Object(map))
        }
        (Type::Enum(constructors), Value::Enum(c)) if constructors.contains(c) => {
            Ok(Json::String(c.clone()))
        }
        (Type::Enum(_), Value::Enum(c)) => Err(CodecError::UnknownConstructor {
            path: path.render(),
            constructor: c.clone(),
        }),
        (ty, value) => Err(decode_mismatch(ty, value, path)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn license_type() -> Type {
        Type::record([
            ("dso", Type::Party),
            ("provider", Type::Party),
            ("user", Type::Party),
            (
                "params",
                Type::record([(
                    "meta",
                    Type::record([("values", Type::text_map(Type::Text))]),
                )]),
            ),
            ("expiresAt", Type::Timestamp),
            ("licenseNum", Type::Int64),
            ("note", Type::optional(Type::Text)),
        ])
    }

    fn license_json() -> Json {
        json!({
            "dso": "dso::1220",
            "provider": "provider::1220",
            "user": "alice::1220",
            "params": {"meta": {"values": {"tier": "gold"}}},
            "expiresAt": "2025-06-01T00:00:00Z",
            "licenseNum": 7,
            "note": null
        })
    }

    #[test]
    fn record_roundtrips_through_canonical_json() {
        let ty = license_type();
        let value = ty.encode(&license_json()).unwrap();
        assert_eq!(value.field("licenseNum"), Some(&Value::Int64(7)));
        assert_eq!(ty.decode(&value).unwrap(), license_json());
    }

    #[test]
    fn ledger_dialect_renders_int64_as_string() {
        let ty = license_type();
        let value = ty.encode(&license_json()).unwrap();
        let ledger = ty.decode_ledger(&value).unwrap();
        assert_eq!(ledger["licenseNum"], json!("7"));
        // The ledger spelling is accepted on input too.
        assert_eq!(ty.encode(&ledger).unwrap(), value);
    }

    #[test]
    fn missing_optional_field_is_none() {
        let mut json = license_json();
        json.as_object_mut().unwrap().remove("note");
        let value = license_type().encode(&json).unwrap();
        assert_eq!(value.field("note"), Some(&Value::none()));
    }

    #[test]
    fn missing_required_field_fails_with_path() {
        let mut json = license_json();
        json["params"]["meta"].as_object_mut().unwrap().remove("values");
        let err = license_type().encode(&json).unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingField {
                path: "$.params.meta".into(),
                field: "values".into()
            }
        );
    }

    #[test]
    fn unknown_field_fails() {
        let mut json = license_json();
        json["surprise"] = json!(1);
        let err = license_type().encode(&json).unwrap_err();
        assert!(matches!(err, CodecError::UnknownField { field, .. } if field == "surprise"));
    }

    #[test]
    fn wrong_kind_reports_expected_type() {
        let mut json = license_json();
        json["licenseNum"] = json!(true);
        let err = license_type().encode(&json).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                path: "$.licenseNum".into(),
                expected: "Int64".into(),
                found: "bool".into()
            }
        );
    }

    #[test]
    fn int64_rejects_fractions_and_overflow() {
        assert!(Type::Int64.encode(&json!(1.5)).is_err());
        assert!(Type::Int64.encode(&json!("9223372036854775808")).is_err());
        assert_eq!(
            Type::Int64.encode(&json!("-9223372036854775808")).unwrap(),
            Value::Int64(i64::MIN)
        );
    }

    #[test]
    fn numeric_scale_is_enforced() {
        let ty = Type::Numeric { scale: 2 };
        assert_eq!(ty.encode(&json!("10.25")).unwrap(), Value::Numeric("10.25".into()));
        assert_eq!(ty.encode(&json!(3)).unwrap(), Value::Numeric("3".into()));
        assert!(ty.encode(&json!("10.255")).is_err());
        assert!(ty.encode(&json!("1e5")).is_err());
        assert!(ty.encode(&json!("12.")).is_err());
        let too_wide = format!("{}", "9".repeat(37));
        assert!(ty.encode(&json!(too_wide)).is_err());
    }

    #[test]
    fn oversized_numeric_scale_is_invalid_not_a_panic() {
        let ty = Type::Numeric { scale: 40 };
        assert!(matches!(
            ty.encode(&json!("1.5")),
            Err(CodecError::InvalidValue { reason, .. }) if reason.contains("scale 40")
        ));
        assert!(matches!(
            ty.decode(&Value::Numeric("1.5".into())),
            Err(CodecError::InvalidValue { .. })
        ));
        let widest = Type::Numeric { scale: MAX_NUMERIC_SCALE };
        assert!(widest.encode(&json!("0.5")).is_ok());
    }

    #[test]
    fn variants_and_enums() {
        let ty = Type::variant([("Pending", Type::Unit), ("Paid", Type::ContractId)]);
        let paid = ty.encode(&json!({"tag": "Paid", "value": "00cid"})).unwrap();
        assert_eq!(ty.decode(&paid).unwrap(), json!({"tag": "Paid", "value": "00cid"}));
        let pending = ty.encode(&json!({"tag": "Pending"})).unwrap();
        assert_eq!(ty.decode(&pending).unwrap(), json!({"tag": "Pending", "value": {}}));
        assert!(matches!(
            ty.encode(&json!({"tag": "Lost", "value": {}})),
            Err(CodecError::UnknownConstructor { .. })
        ));

        let colour = Type::enumeration(["Red", "Green"]);
        assert_eq!(colour.encode(&json!("Red")).unwrap(), Value::Enum("Red".into()));
        assert!(colour.encode(&json!("Blue")).is_err());
    }

    #[test]
    fn nested_optional_list_convention() {
        let ty = Type::optional(Type::optional(Type::Int64));
        assert_eq!(ty.encode(&json!(null)).unwrap(), Value::none());
        assert_eq!(ty.encode(&json!([])).unwrap(), Value::some(Value::none()));
        let v = ty.encode(&json!([5])).unwrap();
        assert_eq!(v, Value::some(Value::some(Value::Int64(5))));
        assert_eq!(ty.decode(&v).unwrap(), json!([5]));
        assert!(ty.encode(&json!(5)).is_err());
    }

    #[test]
    fn decode_rejects_values_that_do_not_match_schema() {
        let err = Type::Text.decode(&Value::Int64(1)).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
        let record = Type::record([("a", Type::Int64)]);
        let wrong_label = Value::Record(vec![("b".into(), Value::Int64(1))]);
        assert!(record.decode(&wrong_label).is_err());
    }

    #[test]
    fn list_errors_carry_index() {
        let ty = Type::list(Type::Party);
        let err = ty.encode(&json!(["alice", ""])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { path, .. } if path == "$[1]"));
    }

    fn arb_payload() -> impl Strategy<Value = Json> {
        (
            "[a-z]{1,12}",
            any::<i64>(),
            proptest::option::of("[ -~]{0,16}"),
            proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..4),
            0i64..4_000_000_000_000_000,
            (0u32..1_000_000, 0u32..100),
        )
            .prop_map(|(user, num, note, meta, micros, (units, cents))| {
                json!({
                    "dso": "dso::1220",
                    "provider": "provider::1220",
                    "user": user,
                    "params": {"meta": {"values": meta}},
                    "expiresAt": format_timestamp(micros).unwrap(),
                    "licenseNum": num,
                    "note": note,
                    "fee": format!("{units}.{cents:02}"),
                })
            })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(json in arb_payload()) {
            let mut ty = license_type();
            if let Type::Record(fields) = &mut ty {
                fields.push(Field::new("fee", Type::decimal()));
            }
            let value = ty.encode(&json).unwrap();
            prop_assert_eq!(ty.decode(&value).unwrap(), json);
        }
    }
}
