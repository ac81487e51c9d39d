//! Template and choice registration.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lgw_types::Identifier;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{CodecError, CodecResult};
use crate::schema::Type;
use crate::value::Value;

/// A Rust payload type bound to a ledger template.
pub trait Template: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn template_id() -> Identifier;
}

/// A choice argument type bound to its template and result type.
pub trait Choice: Serialize + Send + Sync + 'static {
    type Template: Template;
    type Result: DeserializeOwned + Send + 'static;

    /// Choice name as declared on the template.
    const NAME: &'static str;
}

/// Declared argument and result of a choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChoiceSchema {
    pub argument: Type,
    pub result: Type,
    /// Exercising a consuming choice archives the contract.
    pub consuming: bool,
}

/// Declared payload and choices of a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSchema {
    pub id: Identifier,
    pub payload: Type,
    pub choices: BTreeMap<String, ChoiceSchema>,
}

impl TemplateSchema {
    pub fn new(id: Identifier, payload: Type) -> Self {
        Self {
            id,
            payload,
            choices: BTreeMap::new(),
        }
    }

    /// Schema for `T`, taking the identifier from the type.
    pub fn of<T: Template>(payload: Type) -> Self {
        Self::new(T::template_id(), payload)
    }

    pub fn with_choice(
        mut self,
        name: impl Into<String>,
        argument: Type,
        result: Type,
        consuming: bool,
    ) -> Self {
        self.choices.insert(
            name.into(),
            ChoiceSchema {
                argument,
                result,
                consuming,
            },
        );
        self
    }
}

/// Collects template schemas before the dictionary is frozen.
#[derive(Default)]
pub struct DictionaryBuilder {
    templates: HashMap<String, TemplateSchema>,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. A later registration for the same qualified
    /// name replaces the earlier one.
    pub fn register(mut self, schema: TemplateSchema) -> Self {
        let key = schema.id.qualified_name();
        if self.templates.insert(key.clone(), schema).is_some() {
            debug!(template = %key, "template schema replaced");
        }
        self
    }

    pub fn build(self) -> Dictionary {
        debug!(templates = self.templates.len(), "codec dictionary built");
        Dictionary {
            templates: Arc::new(self.templates),
        }
    }
}

/// Immutable registry of template schemas keyed by qualified name.
///
/// Built once at startup and shared read-only; cloning is cheap.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    templates: Arc<HashMap<String, TemplateSchema>>,
}

impl Dictionary {
    pub fn builder() -> DictionaryBuilder {
        DictionaryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Look up a template schema. Package-name references (`#pkg`) and plain
    /// package names resolve to the same entry.
    pub fn template(&self, id: &Identifier) -> CodecResult<&TemplateSchema> {
        self.templates
            .get(&id.qualified_name())
            .ok_or_else(|| CodecError::UnknownTemplate(id.clone()))
    }

    pub fn choice(&self, template: &Identifier, name: &str) -> CodecResult<&ChoiceSchema> {
        self.template(template)?
            .choices
            .get(name)
            .ok_or_else(|| CodecError::UnknownChoice {
                template: template.clone(),
                choice: name.to_string(),
            })
    }

    /// Encode a template payload into a wire value.
    pub fn encode_template<T: Template>(&self, payload: &T) -> CodecResult<Value> {
        let schema = self.template(&T::template_id())?;
        schema.payload.encode(&to_json(payload)?)
    }

    /// Decode a wire value into a template payload.
    pub fn decode_template<T: Template>(&self, value: &Value) -> CodecResult<T> {
        let schema = self.template(&T::template_id())?;
        from_json(schema.payload.decode(value)?)
    }

    /// Decode a payload as stored by the active-contracts projection.
    pub fn template_from_ledger_json<T: Template>(&self, json: &Json) -> CodecResult<T> {
        let schema = self.template(&T::template_id())?;
        let value = schema.payload.encode(json)?;
        from_json(schema.payload.decode(&value)?)
    }

    /// Encode a choice argument into a wire value.
    pub fn encode_choice<C: Choice>(&self, argument: &C) -> CodecResult<Value> {
        let schema = self.choice(&C::Template::template_id(), C::NAME)?;
        schema.argument.encode(&to_json(argument)?)
    }

    /// Decode an exercise result carried as a wire value.
    pub fn decode_choice_result<C: Choice>(&self, value: &Value) -> CodecResult<C::Result> {
        let schema = self.choice(&C::Template::template_id(), C::NAME)?;
        from_json(schema.result.decode(value)?)
    }

    /// Decode an exercise result carried as ledger JSON.
    pub fn choice_result_from_ledger_json<C: Choice>(&self, json: &Json) -> CodecResult<C::Result> {
        let schema = self.choice(&C::Template::template_id(), C::NAME)?;
        let value = schema.result.encode(json)?;
        from_json(schema.result.decode(&value)?)
    }
}

fn to_json<T: Serialize>(value: &T) -> CodecResult<Json> {
    serde_json::to_value(value).map_err(|e| CodecError::Serde(e.to_string()))
}

fn from_json<T: DeserializeOwned>(json: Json) -> CodecResult<T> {
    serde_json::from_value(json).map_err(|e| CodecError::Serde(e.to_string()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct License {
        provider: String,
        user: String,
        license_num: i64,
        expires_at: String,
        description: Option<String>,
    }

    impl Template for License {
        fn template_id() -> Identifier {
            Identifier::new("#quickstart-licensing", "Licensing.License", "License")
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct LicenseExpire {
        actor: String,
        reason: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "tag", content = "value")]
    enum ExpireResult {
        Expired(String),
        AlreadyExpired {},
    }

    impl Choice for LicenseExpire {
        type Template = License;
        type Result = ExpireResult;
        const NAME: &'static str = "License_Expire";
    }

    fn dictionary() -> Dictionary {
        Dictionary::builder()
            .register(
                TemplateSchema::of::<License>(Type::record([
                    ("provider", Type::Party),
                    ("user", Type::Party),
                    ("licenseNum", Type::Int64),
                    ("expiresAt", Type::Timestamp),
                    ("description", Type::optional(Type::Text)),
                ]))
                .with_choice(
                    "License_Expire",
                    Type::record([("actor", Type::Party), ("reason", Type::Text)]),
                    Type::variant([
                        ("Expired", Type::ContractId),
                        ("AlreadyExpired", Type::Unit),
                    ]),
                    true,
                ),
            )
            .build()
    }

    fn sample() -> License {
        License {
            provider: "provider::1220".into(),
            user: "alice::1220".into(),
            license_num: 3,
            expires_at: "2025-06-01T00:00:00Z".into(),
            description: None,
        }
    }

    #[test]
    fn template_roundtrip() {
        let dict = dictionary();
        let value = dict.encode_template(&sample()).unwrap();
        assert_eq!(value.field("licenseNum"), Some(&Value::Int64(3)));
        assert_eq!(dict.decode_template::<License>(&value).unwrap(), sample());
    }

    #[test]
    fn ledger_json_payloads_decode() {
        let dict = dictionary();
        let stored = json!({
            "provider": "provider::1220",
            "user": "alice::1220",
            "licenseNum": "3",
            "expiresAt": "2025-06-01T00:00:00Z",
        });
        assert_eq!(dict.template_from_ledger_json::<License>(&stored).unwrap(), sample());
    }

    #[test]
    fn schema_violation_is_reported_before_serde() {
        let dict = dictionary();
        let mut bad = sample();
        bad.user = String::new();
        let err = dict.encode_template(&bad).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { path, .. } if path == "$.user"));
    }

    #[test]
    fn choice_argument_and_result() {
        let dict = dictionary();
        let arg = LicenseExpire {
            actor: "provider::1220".into(),
            reason: "lapsed".into(),
        };
        let encoded = dict.encode_choice(&arg).unwrap();
        assert_eq!(encoded.field("reason"), Some(&Value::text("lapsed")));

        let result = Value::Variant {
            constructor: "Expired".into(),
            value: Box::new(Value::contract_id("00new")),
        };
        assert_eq!(
            dict.decode_choice_result::<LicenseExpire>(&result).unwrap(),
            ExpireResult::Expired("00new".into())
        );
        let already = json!({"tag": "AlreadyExpired", "value": {}});
        assert_eq!(
            dict.choice_result_from_ledger_json::<LicenseExpire>(&already).unwrap(),
            ExpireResult::AlreadyExpired {}
        );
    }

    #[test]
    fn unregistered_lookups_fail() {
        let dict = Dictionary::default();
        assert!(matches!(
            dict.encode_template(&sample()),
            Err(CodecError::UnknownTemplate(_))
        ));
        let dict = dictionary();
        let err = dict.choice(&License::template_id(), "License_Renew").unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnknownChoice { choice, .. } if choice == "License_Renew"
        ));
    }

    #[test]
    fn lookup_ignores_package_marker() {
        let dict = dictionary();
        let plain = Identifier::new("quickstart-licensing", "Licensing.License", "License");
        assert!(dict.template(&plain).is_ok());
        assert_eq!(dict.len(), 1);
    }

    proptest! {
        #[test]
        fn decode_encode_is_identity(
            user in "[a-z]{1,10}::[0-9a-f]{4}",
            license_num in any::<i64>(),
            secs in 0i64..4_000_000_000,
            description in proptest::option::of("[ -~]{0,24}"),
        ) {
            let dict = dictionary();
            let ts = chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0).unwrap();
            let payload = License {
                provider: "provider::1220".into(),
                user,
                license_num,
                expires_at: ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
                description,
            };
            let value = dict.encode_template(&payload).unwrap();
            prop_assert_eq!(dict.decode_template::<License>(&value).unwrap(), payload);
        }
    }
}
