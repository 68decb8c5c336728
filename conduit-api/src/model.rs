//! Model-driven request construction.
//!
//! [`RequestFactory`] turns a [`Model`] type, an id, a predicate or a
//! mutation kind into an AppSync-style GraphQL document.

use conduit_graphql_client::RequestDocument;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;

use crate::graphql::{GraphQLRequest, ResponseShape};
use crate::{ApiError, Result};

/// A data model exposed by a GraphQL API.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name, e.g. `Post`.
    fn model_name() -> &'static str;

    /// Selected fields, in selection order.
    fn fields() -> &'static [&'static str];

    fn id(&self) -> &str;

    /// Collection name used by list queries.
    fn plural_name() -> String {
        format!("{}s", Self::model_name())
    }
}

/// Kind of model mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Create,
    Update,
    Delete,
}

impl MutationType {
    fn verb(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// Kind of model subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionType {
    OnCreate,
    OnUpdate,
    OnDelete,
}

impl SubscriptionType {
    fn verb(&self) -> &'static str {
        match self {
            Self::OnCreate => "Create",
            Self::OnUpdate => "Update",
            Self::OnDelete => "Delete",
        }
    }
}

/// Field comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    BeginsWith,
}

impl Comparison {
    fn key(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Contains => "contains",
            Self::BeginsWith => "beginsWith",
        }
    }
}

/// Filter or condition over model fields.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPredicate {
    Compare {
        field: String,
        comparison: Comparison,
        value: Value,
    },
    And(Vec<QueryPredicate>),
    Or(Vec<QueryPredicate>),
    Not(Box<QueryPredicate>),
}

impl QueryPredicate {
    pub fn compare(field: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            comparison,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Contains, value)
    }

    pub fn begins_with(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::BeginsWith, value)
    }

    pub fn and(self, other: QueryPredicate) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: QueryPredicate) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Serialize to the filter/condition input object.
    pub fn to_filter(&self) -> Value {
        match self {
            Self::Compare {
                field,
                comparison,
                value,
            } => json!({ field.as_str(): { comparison.key(): value } }),
            Self::And(all) => json!({ "and": all.iter().map(Self::to_filter).collect::<Vec<_>>() }),
            Self::Or(any) => json!({ "or": any.iter().map(Self::to_filter).collect::<Vec<_>>() }),
            Self::Not(inner) => json!({ "not": inner.to_filter() }),
        }
    }

    fn first_unknown_field(&self, known: &[&str]) -> Option<&str> {
        match self {
            Self::Compare { field, .. } => (!known.contains(&field.as_str())).then_some(field.as_str()),
            Self::And(all) | Self::Or(all) => all.iter().find_map(|p| p.first_unknown_field(known)),
            Self::Not(inner) => inner.first_unknown_field(known),
        }
    }
}

impl fmt::Display for QueryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_filter())
    }
}

/// Builds GraphQL requests for [`Model`] types.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFactory;

impl RequestFactory {
    /// `getM(id:)` returning one model.
    pub fn build_query<M: Model>(id: &str) -> Result<GraphQLRequest<M>> {
        let selection = selection::<M>()?;
        if id.trim().is_empty() {
            return Err(ApiError::RequestShape(format!(
                "Cannot query {} without an id",
                M::model_name()
            )));
        }

        let name = M::model_name();
        let query = format!(
            "query Get{name}($id: ID!) {{ get{name}(id: $id) {{ {selection} }} }}"
        );
        Ok(GraphQLRequest::single(query).with_variable("id", Value::String(id.to_string())))
    }

    /// `listMs(filter:)` returning the matching models.
    pub fn build_list_query<M: Model>(predicate: Option<&QueryPredicate>) -> Result<GraphQLRequest<Vec<M>>> {
        let selection = selection::<M>()?;
        let name = M::model_name();
        let plural = M::plural_name();
        let query = format!(
            "query List{plural}($filter: Model{name}FilterInput) {{ list{plural}(filter: $filter) {{ items {{ {selection} }} nextToken }} }}"
        );

        let mut request = GraphQLRequest::array(query);
        if let Some(predicate) = predicate {
            check_predicate::<M>(predicate)?;
            request = request.with_variable("filter", predicate.to_filter());
        }
        Ok(request)
    }

    /// `createM`/`updateM`/`deleteM` with an optional condition.
    pub fn build_mutation<M: Model>(
        model: &M,
        predicate: Option<&QueryPredicate>,
        mutation: MutationType,
    ) -> Result<GraphQLRequest<M>> {
        let selection = selection::<M>()?;
        let name = M::model_name();
        let verb = mutation.verb();

        let input = match mutation {
            MutationType::Delete => json!({ "id": model.id() }),
            _ => match serde_json::to_value(model)? {
                object @ Value::Object(_) => object,
                _ => {
                    return Err(ApiError::RequestShape(format!(
                        "Model {} must serialize to an object",
                        name
                    )));
                }
            },
        };

        let query = format!(
            "mutation {verb}{name}($input: {verb}{name}Input!, $condition: Model{name}ConditionInput) {{ {field}{name}(input: $input, condition: $condition) {{ {selection} }} }}",
            field = verb.to_ascii_lowercase(),
        );

        let mut variables = Map::new();
        variables.insert("input".to_string(), input);
        if let Some(predicate) = predicate {
            check_predicate::<M>(predicate)?;
            variables.insert("condition".to_string(), predicate.to_filter());
        }

        Ok(GraphQLRequest::single(query).with_variables(Value::Object(variables)))
    }

    /// `onCreateM`/`onUpdateM`/`onDeleteM` subscription.
    pub fn build_subscription<M: Model>(subscription: SubscriptionType) -> Result<GraphQLRequest<M>> {
        let selection = selection::<M>()?;
        let name = M::model_name();
        let verb = subscription.verb();
        let query = format!("subscription On{verb}{name} {{ on{verb}{name} {{ {selection} }} }}");
        Ok(GraphQLRequest::new(RequestDocument::new(query), ResponseShape::Stream))
    }
}

fn selection<M: Model>() -> Result<String> {
    let fields = M::fields();
    if fields.is_empty() {
        return Err(ApiError::RequestShape(format!(
            "Model {} declares no fields",
            M::model_name()
        )));
    }
    Ok(fields.join(" "))
}

fn check_predicate<M: Model>(predicate: &QueryPredicate) -> Result<()> {
    match predicate.first_unknown_field(M::fields()) {
        Some(field) => Err(ApiError::RequestShape(format!(
            "Predicate references unknown field '{}' on {}",
            field,
            M::model_name()
        ))),
        None => Ok(()),
    }
}
