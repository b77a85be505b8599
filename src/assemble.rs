use std::collections::BTreeSet;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ActionConfig, AuthConfig, ConfigStore, TriggerConfig};
use crate::context::{CompileContext, HiddenTrigger};
use crate::descriptor::{
    ActionDescriptor, AuthDescriptor, FilterPlan, Generation, LabelPlan, Operation,
    OperationDescriptor, TriggerDescriptor,
};
use crate::document::ApiDocument;
use crate::endpoint::{EndpointDescriptor, HttpMethod, extract_endpoints};
use crate::error::GenerateError;
use crate::field::param_to_field;
use crate::naming::{pluralize, singularize, to_label, to_snake};
use crate::pagination::{self, PaginationInput};
use crate::request::{AuthPlan, QueryParam, QueryValue, RequestPlan};
use crate::response::{detect_id_property, ensure_identifier, shape_action, shape_trigger};
use crate::schema::SchemaResolver;
use crate::transform::{OperationDraft, TransformPipeline};

/// Every visible trigger description starts with this.
pub const TITLE_PHRASE: &str = "Triggers when";
const FALLBACK_NOUN: &str = "Item";

pub fn compile(doc: &ApiDocument, config: &dyn ConfigStore) -> Result<Generation, GenerateError> {
    let mut resolver = SchemaResolver::new(doc);
    let endpoints = extract_endpoints(&mut resolver);
    info!(endpoints = endpoints.len(), "extracted endpoints");

    let auth = config.authentication().map(auth_plan);
    let env = Env {
        base_url: doc.base_url(),
        auth: auth.clone(),
    };
    let mut ctx = CompileContext::new();

    // Pass 1: validate trigger config, register hidden triggers.
    let mut configured = Vec::with_capacity(config.triggers().len());
    for (key, cfg) in config.triggers() {
        let endpoint = find_trigger_endpoint(key, cfg, &endpoints)?;
        let description = trigger_description(key, cfg, endpoint)?;
        if cfg.hidden {
            ctx.register_hidden_trigger(HiddenTrigger {
                key: key.clone(),
                endpoint: endpoint.reference(),
            });
        }
        configured.push((key, cfg, endpoint, description));
    }
    debug!(triggers = configured.len(), "trigger configuration validated");

    // Pass 2: compile.
    let mut operations = Vec::new();
    let mut used_endpoints = BTreeSet::new();

    for (key, cfg, endpoint, description) in configured {
        used_endpoints.insert(endpoint.reference());
        if !ctx.claim_trigger(key) {
            debug!(trigger = key.as_str(), "duplicate trigger key skipped");
            continue;
        }
        let trigger = compile_trigger(key, cfg, endpoint, description, &env);
        operations.push(OperationDescriptor::Trigger(trigger));
    }

    if config.settings().derive_triggers {
        for endpoint in &endpoints {
            if used_endpoints.contains(&endpoint.reference()) {
                continue;
            }
            let Some(trigger) = derive_trigger(endpoint, &env) else {
                continue;
            };
            if !ctx.claim_trigger(&trigger.operation.key) {
                debug!(trigger = trigger.operation.key.as_str(), "duplicate trigger key skipped");
                continue;
            }
            operations.push(OperationDescriptor::Trigger(trigger));
        }
    }

    let no_config = ActionConfig::default();
    for endpoint in &endpoints {
        let cfg = config.action(&endpoint.operation_id).unwrap_or(&no_config);
        if cfg.omit {
            ctx.warn(format!("operation `{}` omitted by configuration", endpoint.operation_id));
            continue;
        }
        let key = to_snake(&endpoint.operation_id);
        if !ctx.claim_action(&key) {
            debug!(action = key.as_str(), "duplicate action key skipped");
            continue;
        }
        let (action, warnings) = compile_action(key, cfg, endpoint, &env, &mut resolver, &ctx)?;
        ctx.extend_warnings(warnings);
        operations.push(OperationDescriptor::Action(action));
    }

    let authentication = match (config.authentication(), auth) {
        (Some(cfg), Some(plan)) => Some(auth_descriptor(cfg, plan, &endpoints, &env, &mut ctx)),
        _ => None,
    };

    for reference in resolver.unresolved() {
        ctx.extend_warnings([format!("unresolvable reference `{reference}`")]);
    }

    info!(operations = operations.len(), warnings = ctx.warnings().len(), "generation complete");

    Ok(Generation {
        version: doc.version().to_string(),
        base_url: doc.base_url().to_string(),
        authentication,
        operations,
        warnings: ctx.into_warnings(),
    })
}

struct Env<'d> {
    base_url: &'d str,
    auth: Option<AuthPlan>,
}

impl Env<'_> {
    fn request_plan(&self, endpoint: &EndpointDescriptor) -> RequestPlan {
        let mut plan = RequestPlan::new(endpoint.method, self.base_url, &endpoint.path);
        plan.auth = self.auth.clone();
        plan
    }
}

fn auth_plan(cfg: &AuthConfig) -> AuthPlan {
    AuthPlan {
        header: cfg.header_name.clone(),
        scheme: cfg.scheme.clone(),
        field_key: cfg.field_key.clone(),
    }
}

fn find_trigger_endpoint<'e>(
    key: &str,
    cfg: &TriggerConfig,
    endpoints: &'e [EndpointDescriptor],
) -> Result<&'e EndpointDescriptor, GenerateError> {
    let reference = cfg
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| GenerateError::MissingEndpoint {
            trigger: key.to_string(),
        })?;

    endpoints
        .iter()
        .find(|ep| ep.matches(reference))
        .ok_or_else(|| GenerateError::UnknownEndpoint {
            trigger: key.to_string(),
            endpoint: reference.to_string(),
        })
}

/// Visible triggers need a title starting with [`TITLE_PHRASE`].
fn trigger_description(
    key: &str,
    cfg: &TriggerConfig,
    endpoint: &EndpointDescriptor,
) -> Result<String, GenerateError> {
    let title = cfg.title.as_deref().map(str::trim).filter(|t| !t.is_empty());

    if cfg.hidden {
        return Ok(title.map(str::to_string).unwrap_or_else(|| {
            let noun = derive_noun(cfg.noun.as_deref(), endpoint);
            format!("Lists {} for dynamic dropdowns.", pluralize(&noun).to_lowercase())
        }));
    }

    match title {
        None => Err(GenerateError::MissingTitle {
            trigger: key.to_string(),
            phrase: TITLE_PHRASE,
        }),
        Some(title) if !title.starts_with(TITLE_PHRASE) => Err(GenerateError::InvalidTitle {
            trigger: key.to_string(),
            title: title.to_string(),
            phrase: TITLE_PHRASE,
        }),
        Some(title) => Ok(title.to_string()),
    }
}

/// Configured noun, else the first tag, else the last static path segment.
fn derive_noun(configured: Option<&str>, endpoint: &EndpointDescriptor) -> String {
    if let Some(noun) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return to_label(noun);
    }
    let raw = endpoint
        .tags
        .first()
        .map(String::as_str)
        .or_else(|| {
            endpoint
                .path
                .split('/')
                .rev()
                .find(|seg| !seg.is_empty() && !seg.starts_with('{'))
        })
        .unwrap_or(FALLBACK_NOUN);
    to_label(&singularize(&to_label(raw)))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compile_trigger(
    key: &str,
    cfg: &TriggerConfig,
    endpoint: &EndpointDescriptor,
    description: String,
    env: &Env<'_>,
) -> TriggerDescriptor {
    let noun = derive_noun(cfg.noun.as_deref(), endpoint);
    let shaped = shape_trigger(endpoint, &noun, cfg.array_property.as_deref());

    let pagination = pagination::plan(PaginationInput {
        endpoint,
        hidden: cfg.hidden,
        response: &shaped.plan,
        body_schema: shaped.body_schema.as_ref(),
        configured_limit: cfg.query_params.get(pagination::LIMIT_PARAM),
        configured_has_more: cfg.has_more_property.as_deref(),
    });
    let is_paging_param =
        |name: &str| pagination.as_ref().is_some_and(|p| p.is_pagination_param(name));

    let mut request = env.request_plan(endpoint);
    let mut fields = Vec::new();
    for param in endpoint.path_params() {
        request.path_params.push(param.name.clone());
        fields.push(param_to_field(param));
    }
    for (name, value) in &cfg.query_params {
        if is_paging_param(name) {
            continue;
        }
        request.query.push(QueryParam {
            name: name.clone(),
            value: QueryValue::Fixed {
                value: display(value),
            },
        });
    }
    for param in endpoint.query_params() {
        if cfg.query_params.contains_key(&param.name) || is_paging_param(&param.name) {
            continue;
        }
        request.query.push(QueryParam {
            name: param.name.clone(),
            value: QueryValue::Field {
                field: param.name.clone(),
            },
        });
        fields.push(param_to_field(param));
    }

    let mut sample = shaped.sample;
    let id_property = detect_id_property(shaped.item_schema.as_ref(), &sample, &noun);
    ensure_identifier(&mut sample, &id_property);

    let filter = (!cfg.filters.is_empty() || cfg.filter_code.is_some()).then(|| FilterPlan {
        equals: cfg.filters.clone(),
        code: cfg.filter_code.clone(),
    });

    debug!(
        trigger = key,
        endpoint = %endpoint.reference(),
        hidden = cfg.hidden,
        paginated = pagination.is_some(),
        "compiled trigger"
    );

    TriggerDescriptor {
        operation: Operation {
            key: key.to_string(),
            label: cfg.name.clone().unwrap_or_else(|| to_label(key)),
            noun,
            description,
            endpoint: endpoint.reference(),
            fields,
            sample,
            request,
            response: shaped.plan,
        },
        hidden: cfg.hidden,
        id_property,
        pagination,
        label_plan: cfg.label.as_deref().map(LabelPlan::parse),
        filter,
    }
}

fn derive_trigger(endpoint: &EndpointDescriptor, env: &Env<'_>) -> Option<TriggerDescriptor> {
    if endpoint.method != HttpMethod::Get || endpoint.path_params().next().is_some() {
        return None;
    }
    let noun = derive_noun(None, endpoint);
    if !shape_trigger(endpoint, &noun, None).plan.is_array_bearing() {
        return None;
    }

    let key = format!("new_{}", to_snake(&noun));
    let cfg = TriggerConfig {
        name: Some(format!("New {noun}")),
        noun: Some(noun.clone()),
        ..TriggerConfig::default()
    };
    let description = format!("{TITLE_PHRASE} a new {} is available.", noun.to_lowercase());
    Some(compile_trigger(&key, &cfg, endpoint, description, env))
}

fn compile_action(
    key: String,
    cfg: &ActionConfig,
    endpoint: &EndpointDescriptor,
    env: &Env<'_>,
    resolver: &mut SchemaResolver<'_>,
    ctx: &CompileContext,
) -> Result<(ActionDescriptor, Vec<String>), GenerateError> {
    let noun = derive_noun(cfg.noun.as_deref(), endpoint);
    let extraction = cfg.response_extraction.clone().unwrap_or_default();
    let shaped = shape_action(
        endpoint,
        &noun,
        extraction.extract_single,
        extraction.property.as_deref(),
    );

    let mut draft = OperationDraft::from_endpoint(endpoint, env.base_url);
    draft.request.auth = env.auth.clone();
    draft.sample = shaped.sample;

    let pipeline = TransformPipeline::from_config(&endpoint.operation_id, cfg, resolver)?;
    pipeline.run(&mut draft, ctx)?;

    let label = endpoint
        .summary
        .clone()
        .unwrap_or_else(|| to_label(&endpoint.operation_id));
    let description = endpoint
        .description
        .clone()
        .or_else(|| endpoint.summary.clone())
        .unwrap_or_else(|| format!("Calls {}.", endpoint.reference()));

    debug!(
        action = key.as_str(),
        endpoint = %endpoint.reference(),
        transforms = pipeline.len(),
        "compiled action"
    );

    let action = ActionDescriptor {
        operation: Operation {
            key,
            noun,
            label,
            description,
            endpoint: endpoint.reference(),
            fields: draft.fields,
            sample: draft.sample,
            request: draft.request,
            response: shaped.plan,
        },
    };
    Ok((action, draft.warnings))
}

fn auth_descriptor(
    cfg: &AuthConfig,
    plan: AuthPlan,
    endpoints: &[EndpointDescriptor],
    env: &Env<'_>,
    ctx: &mut CompileContext,
) -> AuthDescriptor {
    let test = cfg.test_endpoint.as_deref().and_then(|reference| {
        match endpoints.iter().find(|ep| ep.matches(reference)) {
            Some(endpoint) => Some(env.request_plan(endpoint)),
            None if reference.starts_with('/') => {
                let mut plan = RequestPlan::new(HttpMethod::Get, env.base_url, reference);
                plan.auth = env.auth.clone();
                Some(plan)
            }
            None => {
                ctx.warn(format!("authentication test endpoint `{reference}` not found"));
                None
            }
        }
    });

    AuthDescriptor {
        field_key: cfg.field_key.clone(),
        connection_label: cfg.connection_label.clone(),
        plan,
        test,
    }
}
