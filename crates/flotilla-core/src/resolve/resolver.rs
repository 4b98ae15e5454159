//! Reference resolution over a parsed descriptor.
//!
//! Walks every parameter and property map in declaration-scope order and
//! substitutes reference tokens: short tokens against the parameter scope
//! chain, qualified tokens against provided dependencies, resources and
//! (for `<mta-id>:<dependency>` names) the configuration registry. Names
//! in the ignore set are left untouched so a caller can resolve in two
//! phases, deferring values that only exist after infrastructure creation.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{ContentError, Error};
use crate::model::{DeploymentDescriptor, Module, Properties, RequiredDependency, Resource};
use crate::registry::entry::{CloudTarget, PROVIDER_ID_DELIMITER};
use crate::registry::filter::ConfigurationFilter;
use crate::registry::matcher::{ConfigurationEntryMatcher, MatchCardinality};
use crate::resolve::reference::{ReferenceToken, find_tokens};

pub struct ReferenceResolver<'m> {
    ignored: BTreeSet<String>,
    external: Option<ExternalLookup<'m>>,
}

struct ExternalLookup<'m> {
    matcher: &'m ConfigurationEntryMatcher<'m>,
    consumer_target: CloudTarget,
}

/// Lookup context while resolving one container's values.
struct Scope<'d> {
    /// Parameter maps consulted for short tokens, innermost first.
    chain: Vec<&'d Properties>,
    /// Owning module, giving its own provided dependencies precedence.
    module: Option<&'d Module>,
    /// Container description for error messages.
    container: String,
}

enum Provider<'d> {
    Provided(&'d Module, &'d Properties),
    Resource(&'d Resource),
}

impl<'m> ReferenceResolver<'m> {
    pub fn new() -> Self {
        Self {
            ignored: BTreeSet::new(),
            external: None,
        }
    }

    /// Dependency names to skip; their tokens stay as written.
    pub fn with_ignored<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored = names.into_iter().map(Into::into).collect();
        self
    }

    /// Enable direct `<mta-id>:<dependency>` references through a matcher.
    pub fn with_matcher(
        mut self,
        matcher: &'m ConfigurationEntryMatcher<'m>,
        consumer_target: CloudTarget,
    ) -> Self {
        self.external = Some(ExternalLookup {
            matcher,
            consumer_target,
        });
        self
    }

    /// Substitute all reference tokens in place.
    ///
    /// Order: descriptor parameters, then each module (properties,
    /// parameters, provided dependencies, required dependencies), then each
    /// resource. Later containers see earlier resolved values.
    pub fn resolve(&self, descriptor: &mut DeploymentDescriptor) -> Result<(), Error> {
        tracing::debug!(mta_id = %descriptor.id, "resolving references");

        let resolved = {
            let scope = Scope::descriptor(descriptor);
            self.resolve_map(descriptor, &scope, &descriptor.parameters)?
        };
        descriptor.parameters = resolved;

        for index in 0..descriptor.modules.len() {
            let resolved = {
                let module = &descriptor.modules[index];
                let scope = Scope::module(descriptor, module);
                self.resolve_map(descriptor, &scope, &module.properties)?
            };
            descriptor.modules[index].properties = resolved;

            let resolved = {
                let module = &descriptor.modules[index];
                let scope = Scope::module(descriptor, module);
                self.resolve_map(descriptor, &scope, &module.parameters)?
            };
            descriptor.modules[index].parameters = resolved;

            for provided_index in 0..descriptor.modules[index].provided.len() {
                let resolved = {
                    let module = &descriptor.modules[index];
                    let provided = &module.provided[provided_index];
                    let scope = Scope::provided(descriptor, module, &provided.name);
                    self.resolve_map(descriptor, &scope, &provided.properties)?
                };
                descriptor.modules[index].provided[provided_index].properties = resolved;
            }

            for required_index in 0..descriptor.modules[index].required.len() {
                let (parameters, properties) = {
                    let module = &descriptor.modules[index];
                    let required = &module.required[required_index];
                    let scope = Scope::required(descriptor, Some(module), None, required);
                    (
                        self.resolve_map(descriptor, &scope, &required.parameters)?,
                        self.resolve_map(descriptor, &scope, &required.properties)?,
                    )
                };
                descriptor.modules[index].required[required_index].parameters = parameters;
                descriptor.modules[index].required[required_index].properties = properties;
            }
        }

        for index in 0..descriptor.resources.len() {
            let (properties, parameters) = {
                let resource = &descriptor.resources[index];
                let scope = Scope::resource(descriptor, resource);
                (
                    self.resolve_map(descriptor, &scope, &resource.properties)?,
                    self.resolve_map(descriptor, &scope, &resource.parameters)?,
                )
            };
            descriptor.resources[index].properties = properties;
            descriptor.resources[index].parameters = parameters;

            for required_index in 0..descriptor.resources[index].required.len() {
                let (parameters, properties) = {
                    let resource = &descriptor.resources[index];
                    let required = &resource.required[required_index];
                    let scope = Scope::required(descriptor, None, Some(resource), required);
                    (
                        self.resolve_map(descriptor, &scope, &required.parameters)?,
                        self.resolve_map(descriptor, &scope, &required.properties)?,
                    )
                };
                descriptor.resources[index].required[required_index].parameters = parameters;
                descriptor.resources[index].required[required_index].properties = properties;
            }
        }

        Ok(())
    }

    fn resolve_map(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        map: &Properties,
    ) -> Result<Properties, Error> {
        let mut resolved = Properties::new();
        for (key, value) in map {
            let mut stack = Vec::new();
            resolved.insert(
                key.clone(),
                self.resolve_value(descriptor, scope, value, &mut stack)?,
            );
        }
        Ok(resolved)
    }

    fn resolve_value(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        value: &Value,
        stack: &mut Vec<String>,
    ) -> Result<Value, Error> {
        match value {
            Value::String(text) => self.resolve_text(descriptor, scope, text, stack),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(descriptor, scope, item, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| {
                    Ok((
                        key.clone(),
                        self.resolve_value(descriptor, scope, item, stack)?,
                    ))
                })
                .collect::<Result<serde_json::Map<_, _>, Error>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn resolve_text(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        text: &str,
        stack: &mut Vec<String>,
    ) -> Result<Value, Error> {
        let tokens = find_tokens(text);
        if tokens.is_empty() {
            return Ok(Value::String(text.to_string()));
        }

        // A value that is exactly one token keeps the referenced type.
        if let [token] = tokens.as_slice()
            && token.spans(text)
            && !token.escaped
        {
            return match self.resolve_token(descriptor, scope, token, stack)? {
                Some(value) => Ok(value),
                None => Ok(Value::String(text.to_string())),
            };
        }

        let mut output = String::new();
        let mut cursor = 0;
        for token in &tokens {
            output.push_str(&text[cursor..token.start]);
            if token.escaped {
                output.push_str(&token.literal);
            } else {
                match self.resolve_token(descriptor, scope, token, stack)? {
                    Some(value) => output.push_str(&value_as_text(&value)),
                    None => output.push_str(&token.literal),
                }
            }
            cursor = token.end;
        }
        output.push_str(&text[cursor..]);
        Ok(Value::String(output))
    }

    /// Resolve one token; `None` means the name is ignored and the literal
    /// stays as written.
    fn resolve_token(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        token: &ReferenceToken,
        stack: &mut Vec<String>,
    ) -> Result<Option<Value>, Error> {
        if self.ignored.contains(&token.dependency) {
            return Ok(None);
        }
        if stack.contains(&token.dependency) {
            let mut chain = stack.clone();
            chain.push(token.dependency.clone());
            return Err(ContentError::ReferenceCycle { chain }.into());
        }
        stack.push(token.dependency.clone());
        let resolved = if token.is_short() {
            self.resolve_parameter(descriptor, scope, token, stack)
        } else {
            self.resolve_dependency(descriptor, scope, token, stack)
        };
        stack.pop();
        resolved.map(Some)
    }

    fn resolve_parameter(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        token: &ReferenceToken,
        stack: &mut Vec<String>,
    ) -> Result<Value, Error> {
        for parameters in &scope.chain {
            if let Some(value) = parameters.get(&token.dependency) {
                return self.resolve_value(descriptor, scope, value, stack);
            }
        }
        Err(ContentError::UnresolvedReference {
            dependency: token.dependency.clone(),
            container: scope.container.clone(),
        }
        .into())
    }

    fn resolve_dependency(
        &self,
        descriptor: &DeploymentDescriptor,
        scope: &Scope<'_>,
        token: &ReferenceToken,
        stack: &mut Vec<String>,
    ) -> Result<Value, Error> {
        if let Some(provider) = find_provider(descriptor, scope.module, &token.dependency) {
            let (properties, provider_scope) = match provider {
                Provider::Provided(module, properties) => {
                    (properties, Scope::module(descriptor, module))
                }
                Provider::Resource(resource) => {
                    (&resource.properties, Scope::resource(descriptor, resource))
                }
            };
            let value = lookup_path(properties, &token.path).ok_or_else(|| {
                ContentError::UnresolvedProperty {
                    dependency: token.dependency.clone(),
                    key: token.key(),
                }
            })?;
            return self.resolve_value(descriptor, &provider_scope, value, stack);
        }

        if token.dependency.contains(PROVIDER_ID_DELIMITER)
            && let Some(external) = &self.external
        {
            return self.resolve_external(external, token);
        }

        Err(ContentError::UnresolvedReference {
            dependency: token.dependency.clone(),
            container: scope.container.clone(),
        }
        .into())
    }

    fn resolve_external(
        &self,
        external: &ExternalLookup<'_>,
        token: &ReferenceToken,
    ) -> Result<Value, Error> {
        let filter = ConfigurationFilter::for_provider(
            &token.dependency,
            external.consumer_target.clone(),
        );
        let entries = external.matcher.match_entries(
            &token.dependency,
            &filter,
            &external.consumer_target,
            MatchCardinality::Single,
            false,
        )?;
        let entry = entries
            .first()
            .ok_or_else(|| ContentError::NoMatchingEntries {
                dependency: token.dependency.clone(),
            })?;
        let content = entry.parsed_content()?;
        let value = lookup_path(&content, &token.path).ok_or_else(|| {
            ContentError::UnresolvedProperty {
                dependency: token.dependency.clone(),
                key: token.key(),
            }
        })?;
        Ok(value.clone())
    }
}

impl Default for ReferenceResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> Scope<'d> {
    fn descriptor(descriptor: &'d DeploymentDescriptor) -> Self {
        Self {
            chain: vec![&descriptor.parameters],
            module: None,
            container: "deployment descriptor".to_string(),
        }
    }

    fn module(descriptor: &'d DeploymentDescriptor, module: &'d Module) -> Self {
        Self {
            chain: vec![&module.parameters, &descriptor.parameters],
            module: Some(module),
            container: format!("module '{}'", module.name),
        }
    }

    fn provided(descriptor: &'d DeploymentDescriptor, module: &'d Module, name: &str) -> Self {
        Self {
            chain: vec![&module.parameters, &descriptor.parameters],
            module: Some(module),
            container: format!("provided dependency '{}' of module '{}'", name, module.name),
        }
    }

    fn required(
        descriptor: &'d DeploymentDescriptor,
        module: Option<&'d Module>,
        resource: Option<&'d Resource>,
        required: &'d RequiredDependency,
    ) -> Self {
        let mut chain = vec![&required.parameters];
        let container = if let Some(module) = module {
            chain.push(&module.parameters);
            format!(
                "required dependency '{}' of module '{}'",
                required.name, module.name
            )
        } else if let Some(resource) = resource {
            chain.push(&resource.parameters);
            format!(
                "required dependency '{}' of resource '{}'",
                required.name, resource.name
            )
        } else {
            format!("required dependency '{}'", required.name)
        };
        chain.push(&descriptor.parameters);
        Self {
            chain,
            module,
            container,
        }
    }

    fn resource(descriptor: &'d DeploymentDescriptor, resource: &'d Resource) -> Self {
        Self {
            chain: vec![&resource.parameters, &descriptor.parameters],
            module: None,
            container: format!("resource '{}'", resource.name),
        }
    }
}

/// Find the provider a qualified token names: the owning module's provided
/// dependencies first, then any module's, then resources.
fn find_provider<'d>(
    descriptor: &'d DeploymentDescriptor,
    own: Option<&'d Module>,
    name: &str,
) -> Option<Provider<'d>> {
    if let Some(module) = own
        && let Some(provided) = module.provided_dependency(name)
    {
        return Some(Provider::Provided(module, &provided.properties));
    }
    if let Some((module, provided)) = descriptor.provided_dependency(name) {
        return Some(Provider::Provided(module, &provided.properties));
    }
    descriptor.resource(name).map(Provider::Resource)
}

/// Walk a key path: map keys for objects, numeric indexes for lists.
fn lookup_path<'v>(properties: &'v Properties, path: &[String]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    let mut current = properties.get(first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProvidedDependency, parse_str};

    const DESCRIPTOR: &str = r#"
_schema-version: "3.1"
ID: shop
version: 1.0.0
parameters:
  domain: shop.example.test
modules:
  - name: frontend
    type: javascript
    parameters:
      host: web
    properties:
      backend_url: ${backend-api/url}
      own_url: https://${host}.${domain}
    requires:
      - name: backend-api
  - name: backend
    type: java
    provides:
      - name: backend-api
        properties:
          url: https://api.${domain}
          pool: { min: 2, max: 8 }
resources:
  - name: shop-db
    type: org.cloudfoundry.managed-service
    properties:
      dialect: postgres
"#;

    fn descriptor() -> DeploymentDescriptor {
        parse_str(DESCRIPTOR).unwrap()
    }

    #[test]
    fn test_resolves_qualified_and_short_tokens() {
        let mut descriptor = descriptor();
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();

        let frontend = descriptor.module("frontend").unwrap();
        assert_eq!(
            frontend.properties["backend_url"],
            Value::String("https://api.shop.example.test".into())
        );
        assert_eq!(
            frontend.properties["own_url"],
            Value::String("https://web.shop.example.test".into())
        );
    }

    #[test]
    fn test_whole_token_keeps_referenced_type() {
        let mut descriptor = descriptor();
        descriptor.modules[0].properties.insert(
            "pool".into(),
            Value::String("${backend-api/pool}".into()),
        );
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();

        let pool = &descriptor.module("frontend").unwrap().properties["pool"];
        assert_eq!(pool["min"], Value::from(2));
        assert_eq!(pool["max"], Value::from(8));
    }

    #[test]
    fn test_nested_path_lookup() {
        let mut descriptor = descriptor();
        descriptor.modules[0].properties.insert(
            "pool_max".into(),
            Value::String("${backend-api/pool/max}".into()),
        );
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();
        assert_eq!(
            descriptor.module("frontend").unwrap().properties["pool_max"],
            Value::from(8)
        );
    }

    #[test]
    fn test_resource_properties_serve_as_provider() {
        let mut descriptor = descriptor();
        descriptor.modules[0]
            .properties
            .insert("db".into(), Value::String("${shop-db/dialect}".into()));
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();
        assert_eq!(
            descriptor.module("frontend").unwrap().properties["db"],
            Value::String("postgres".into())
        );
    }

    #[test]
    fn test_ignored_names_stay_as_written() {
        let mut descriptor = descriptor();
        descriptor.modules[0].properties.insert(
            "instance".into(),
            Value::String("${service-instance/guid}".into()),
        );
        ReferenceResolver::new()
            .with_ignored(["service-instance"])
            .resolve(&mut descriptor)
            .unwrap();
        assert_eq!(
            descriptor.module("frontend").unwrap().properties["instance"],
            Value::String("${service-instance/guid}".into())
        );
    }

    #[test]
    fn test_unknown_dependency_names_container() {
        let mut descriptor = descriptor();
        descriptor.modules[0]
            .properties
            .insert("bad".into(), Value::String("${nowhere/key}".into()));
        let err = ReferenceResolver::new()
            .resolve(&mut descriptor)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::UnresolvedReference { ref dependency, ref container })
                if dependency == "nowhere" && container == "module 'frontend'"
        ));
    }

    #[test]
    fn test_missing_property_key() {
        let mut descriptor = descriptor();
        descriptor.modules[0]
            .properties
            .insert("bad".into(), Value::String("${backend-api/nope}".into()));
        let err = ReferenceResolver::new()
            .resolve(&mut descriptor)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::UnresolvedProperty { ref key, .. }) if key == "nope"
        ));
    }

    #[test]
    fn test_cycle_detection_names_participants() {
        let mut descriptor = descriptor();
        descriptor.modules[1].provided[0]
            .properties
            .insert("loop".into(), Value::String("${frontend-api/loop}".into()));
        descriptor.modules[0].provided.push(ProvidedDependency {
            name: "frontend-api".into(),
            public: true,
            properties: [("loop".to_string(), Value::String("${backend-api/loop}".into()))]
                .into_iter()
                .collect(),
        });
        descriptor.modules[0]
            .properties
            .insert("start".into(), Value::String("${backend-api/loop}".into()));

        let err = ReferenceResolver::new()
            .resolve(&mut descriptor)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Content(ContentError::ReferenceCycle { ref chain })
                if chain.first().map(String::as_str) == Some("backend-api")
                    && chain.last().map(String::as_str) == Some("backend-api")
        ));
    }

    #[test]
    fn test_escaped_tokens_survive() {
        let mut descriptor = descriptor();
        descriptor.modules[0].properties.insert(
            "doc".into(),
            Value::String(r"use \${backend-api/url} verbatim".into()),
        );
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();
        assert_eq!(
            descriptor.module("frontend").unwrap().properties["doc"],
            Value::String(r"use \${backend-api/url} verbatim".into())
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut descriptor = descriptor();
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();
        let resolved = descriptor.clone();
        ReferenceResolver::new().resolve(&mut descriptor).unwrap();
        assert_eq!(descriptor, resolved);
    }

    #[test]
    fn test_external_reference_through_matcher() {
        use crate::registry::entry::ConfigurationEntry;
        use crate::registry::snapshot::RegistrySnapshot;

        let target = CloudTarget::new("org", "dev");
        let entry = ConfigurationEntry::new(
            1,
            "other-mta:api",
            None,
            target.clone(),
            r#"{"url": "https://other.test"}"#,
        );
        let snapshot = RegistrySnapshot::from_entries([entry]).unwrap();
        let matcher = ConfigurationEntryMatcher::new(&snapshot);

        let mut descriptor = descriptor();
        descriptor.modules[0].properties.insert(
            "other".into(),
            Value::String("${other-mta:api/url}".into()),
        );
        ReferenceResolver::new()
            .with_matcher(&matcher, target)
            .resolve(&mut descriptor)
            .unwrap();
        assert_eq!(
            descriptor.module("frontend").unwrap().properties["other"],
            Value::String("https://other.test".into())
        );
    }
}
