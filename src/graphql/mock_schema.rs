//! Executable schemas from SDL, with mock fallbacks for unimplemented fields
//!
//! [`build`] parses SDL type definitions and registers every type with the
//! async-graphql dynamic schema API. Each object field resolves in this order:
//!
//! 1. a parent that is itself a mock yields a mock (mocked subtrees stay mocked)
//! 2. the registered real resolver, when resolvers are preserved
//! 3. the property with the field's name on a plain-object parent value
//! 4. a mock value, or an error when mocking is disabled
//!
//! Mock values default to `42`, `4.2`, `"Hello World"`, `true` and a fresh
//! UUID for the built-in scalars. Enums mock to their first value, lists to
//! two items, and abstract types to their first concrete type. A
//! [`MockRegistry`] overrides the default for any named type.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, SchemaBuilder, TypeRef, Union,
};
use async_graphql::{Error, Name, Value};
use async_graphql_parser::types::{
    BaseType, FieldDefinition, InputValueDefinition, Type, TypeKind, TypeSystemDefinition,
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const UPLOAD_SCALAR: &str = "Upload";
const MOCK_LIST_LENGTH: usize = 2;

pub type ResolverFn =
    Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static>;

pub type MockFn = Arc<dyn Fn() -> Value + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SchemaBuildError {
    #[error("Failed to parse type definitions: {0}")]
    Parse(#[from] async_graphql_parser::Error),

    #[error("Query root type '{0}' is not defined")]
    MissingQueryRoot(String),

    #[error("Invalid schema: {0}")]
    Build(String),
}

/// Real resolvers keyed by `(type, field)`
#[derive(Clone, Default)]
pub struct ResolverMap {
    resolvers: HashMap<(String, String), ResolverFn>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<F>(mut self, type_name: &str, field_name: &str, resolver: F) -> Self
    where
        F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
    {
        self.resolvers.insert(
            (type_name.to_string(), field_name.to_string()),
            Arc::new(resolver),
        );
        self
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&ResolverFn> {
        self.resolvers
            .get(&(type_name.to_string(), field_name.to_string()))
    }

    fn len(&self) -> usize {
        self.resolvers.len()
    }

    fn keys(&self) -> impl Iterator<Item = &(String, String)> {
        self.resolvers.keys()
    }
}

/// Custom mock values keyed by type name.
///
/// For object types the mock may return an object holding a subset of the
/// type's fields; fields it leaves out are mocked as usual.
#[derive(Clone, Default)]
pub struct MockRegistry {
    mocks: HashMap<String, MockFn>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mock<F>(mut self, type_name: &str, mock: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.mocks.insert(type_name.to_string(), Arc::new(mock));
        self
    }

    pub fn with_value(self, type_name: &str, value: Value) -> Self {
        self.with_mock(type_name, move || value.clone())
    }

    fn generate(&self, type_name: &str) -> Option<Value> {
        self.mocks.get(type_name).map(|mock| mock())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockOptions {
    /// Fill fields that have no resolver with mock values
    pub mocks: bool,
    /// Keep registered resolvers instead of mocking everything
    pub preserve_resolvers: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            mocks: true,
            preserve_resolvers: true,
        }
    }
}

/// An object produced by the mock engine rather than by a resolver
#[derive(Clone, Debug)]
pub struct MockedObject {
    pub type_name: String,
    pub values: Value,
}

impl MockedObject {
    fn value_of(&self, field_name: &str) -> Option<&Value> {
        match &self.values {
            Value::Object(map) => map.get(field_name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
enum Shape {
    Named(String),
    List(Box<Shape>),
}

impl Shape {
    fn of(ty: &Type) -> Self {
        match &ty.base {
            BaseType::Named(name) => Shape::Named(name.to_string()),
            BaseType::List(inner) => Shape::List(Box::new(Shape::of(inner))),
        }
    }
}

#[derive(Clone, Debug)]
enum Kind {
    Scalar,
    Object,
    Interface(Vec<String>),
    Union(Vec<String>),
    Enum(Vec<String>),
    InputObject,
}

fn is_builtin_scalar(name: &str) -> bool {
    matches!(name, "Int" | "Float" | "String" | "Boolean" | "ID")
}

fn default_scalar(name: &str) -> Value {
    match name {
        "Int" => Value::from(42),
        "Float" => Value::from(4.2_f64),
        "Boolean" => Value::from(true),
        "ID" => Value::from(Uuid::new_v4().to_string()),
        _ => Value::from("Hello World"),
    }
}

struct MockEngine {
    kinds: HashMap<String, Kind>,
    mocks: MockRegistry,
    enabled: bool,
}

impl MockEngine {
    fn kind(&self, name: &str) -> Option<&Kind> {
        self.kinds.get(name)
    }

    /// First concrete object type behind a possibly abstract type
    fn concrete_type(&self, name: &str) -> Result<String, Error> {
        match self.kind(name) {
            Some(Kind::Object) => Ok(name.to_string()),
            Some(Kind::Interface(types)) | Some(Kind::Union(types)) => types
                .first()
                .ok_or_else(|| Error::new(format!("No concrete type implements '{}'", name)))
                .and_then(|first| self.concrete_type(first)),
            _ => Err(Error::new(format!("'{}' is not an output object type", name))),
        }
    }

    fn is_abstract(&self, name: &str) -> bool {
        matches!(
            self.kind(name),
            Some(Kind::Interface(_)) | Some(Kind::Union(_))
        )
    }

    fn is_composite(&self, name: &str) -> bool {
        matches!(
            self.kind(name),
            Some(Kind::Object) | Some(Kind::Interface(_)) | Some(Kind::Union(_))
        )
    }

    fn mock(&self, shape: &Shape) -> Result<FieldValue<'static>, Error> {
        match shape {
            Shape::List(inner) => {
                let items = (0..MOCK_LIST_LENGTH)
                    .map(|_| self.mock(inner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FieldValue::list(items))
            }
            Shape::Named(name) => self.mock_named(name),
        }
    }

    fn mock_named(&self, name: &str) -> Result<FieldValue<'static>, Error> {
        if is_builtin_scalar(name) {
            let value = self
                .mocks
                .generate(name)
                .unwrap_or_else(|| default_scalar(name));
            return Ok(FieldValue::value(value));
        }

        match self.kind(name) {
            Some(Kind::Scalar) => {
                let value = self
                    .mocks
                    .generate(name)
                    .unwrap_or_else(|| default_scalar(name));
                Ok(FieldValue::value(value))
            }
            Some(Kind::Enum(values)) => {
                let value = match self.mocks.generate(name) {
                    Some(value) => value,
                    None => values
                        .first()
                        .map(|v| Value::Enum(Name::new(v)))
                        .unwrap_or(Value::Null),
                };
                Ok(FieldValue::value(value))
            }
            Some(Kind::Object) => Ok(FieldValue::owned_any(MockedObject {
                type_name: name.to_string(),
                values: self.mocks.generate(name).unwrap_or(Value::Null),
            })),
            Some(Kind::Interface(_)) | Some(Kind::Union(_)) => {
                let concrete = self.concrete_type(name)?;
                let values = self
                    .mocks
                    .generate(name)
                    .or_else(|| self.mocks.generate(&concrete))
                    .unwrap_or(Value::Null);
                Ok(FieldValue::owned_any(MockedObject {
                    type_name: concrete.clone(),
                    values,
                })
                .with_type(concrete))
            }
            Some(Kind::InputObject) | None => {
                Err(Error::new(format!("Cannot mock a value of type '{}'", name)))
            }
        }
    }

    /// Wrap an existing value for the field's shape.
    ///
    /// With `mocked` set, composite values become [`MockedObject`]s so their
    /// own fields keep resolving from the mock engine.
    fn wrap(&self, shape: &Shape, value: Value, mocked: bool) -> Result<FieldValue<'static>, Error> {
        match (shape, value) {
            (_, Value::Null) => Ok(FieldValue::NULL),
            (Shape::List(inner), Value::List(items)) => {
                let items = items
                    .into_iter()
                    .map(|item| self.wrap(inner, item, mocked))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FieldValue::list(items))
            }
            (Shape::Named(name), value @ Value::Object(_)) if self.is_composite(name) => {
                let concrete = match &value {
                    Value::Object(map) => match map.get("__typename") {
                        Some(Value::String(typename)) => typename.clone(),
                        _ => self.concrete_type(name)?,
                    },
                    _ => self.concrete_type(name)?,
                };

                let field_value = if mocked {
                    FieldValue::owned_any(MockedObject {
                        type_name: concrete.clone(),
                        values: value,
                    })
                } else {
                    FieldValue::value(value)
                };

                if self.is_abstract(name) {
                    Ok(field_value.with_type(concrete))
                } else {
                    Ok(field_value)
                }
            }
            (Shape::Named(name), Value::String(item))
                if matches!(self.kind(name), Some(Kind::Enum(_))) =>
            {
                Ok(FieldValue::value(Value::Enum(Name::new(item))))
            }
            (_, value) => Ok(FieldValue::value(value)),
        }
    }
}

fn ready<'a>(result: Result<Option<FieldValue<'a>>, Error>) -> FieldFuture<'a> {
    FieldFuture::new(async move { result })
}

struct FieldPlan {
    type_name: String,
    field_name: String,
    shape: Shape,
    resolver: Option<ResolverFn>,
    engine: Arc<MockEngine>,
}

impl FieldPlan {
    fn resolve<'a>(&self, ctx: ResolverContext<'a>) -> FieldFuture<'a> {
        if let Some(mocked) = ctx.parent_value.downcast_ref::<MockedObject>() {
            let result = match mocked.value_of(&self.field_name) {
                Some(value) => self.engine.wrap(&self.shape, value.clone(), true),
                None => self.engine.mock(&self.shape),
            };
            return ready(result.map(Some));
        }

        if let Some(resolver) = &self.resolver {
            return resolver(ctx);
        }

        if let Some(Value::Object(map)) = ctx.parent_value.as_value() {
            if let Some(value) = map.get(self.field_name.as_str()) {
                return ready(
                    self.engine
                        .wrap(&self.shape, value.clone(), false)
                        .map(Some),
                );
            }
        }

        if self.engine.enabled {
            return ready(self.engine.mock(&self.shape).map(Some));
        }

        ready(Err(Error::new(format!(
            "Resolve function for \"{}.{}\" returned undefined",
            self.type_name, self.field_name
        ))))
    }
}

struct ObjectDef {
    description: Option<String>,
    implements: Vec<String>,
    fields: Vec<FieldDefinition>,
}

enum Definition {
    Scalar(Option<String>),
    Object(ObjectDef),
    Interface(ObjectDef),
    Union(Vec<String>),
    Enum(Vec<String>),
    InputObject(Vec<InputValueDefinition>),
}

impl Definition {
    fn kind_name(&self) -> &'static str {
        match self {
            Definition::Scalar(_) => "scalar",
            Definition::Object(_) => "type",
            Definition::Interface(_) => "interface",
            Definition::Union(_) => "union",
            Definition::Enum(_) => "enum",
            Definition::InputObject(_) => "input",
        }
    }

    fn merge(&mut self, extension: Definition) -> Result<(), SchemaBuildError> {
        match (self, extension) {
            (Definition::Object(base), Definition::Object(ext))
            | (Definition::Interface(base), Definition::Interface(ext)) => {
                base.implements.extend(ext.implements);
                base.fields.extend(ext.fields);
            }
            (Definition::Union(base), Definition::Union(ext))
            | (Definition::Enum(base), Definition::Enum(ext)) => base.extend(ext),
            (Definition::InputObject(base), Definition::InputObject(ext)) => base.extend(ext),
            (Definition::Scalar(_), Definition::Scalar(_)) => {}
            (base, ext) => {
                return Err(SchemaBuildError::Build(format!(
                    "cannot extend {} with {}",
                    base.kind_name(),
                    ext.kind_name()
                )))
            }
        }
        Ok(())
    }
}

fn object_def(
    description: Option<String>,
    implements: Vec<String>,
    fields: Vec<FieldDefinition>,
) -> ObjectDef {
    ObjectDef {
        description,
        implements,
        fields,
    }
}

struct ParsedSchema {
    query: String,
    mutation: Option<String>,
    order: Vec<String>,
    definitions: HashMap<String, Definition>,
}

fn parse(sdl: &str) -> Result<ParsedSchema, SchemaBuildError> {
    let document = async_graphql_parser::parse_schema(sdl)?;

    let mut query = None;
    let mut mutation = None;
    let mut order = Vec::new();
    let mut definitions: HashMap<String, Definition> = HashMap::new();

    for definition in document.definitions {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                let schema = schema.node;
                if let Some(name) = schema.query {
                    query = Some(name.node.to_string());
                }
                if let Some(name) = schema.mutation {
                    mutation = Some(name.node.to_string());
                }
                if schema.subscription.is_some() {
                    warn!("Subscription root is ignored");
                }
            }
            TypeSystemDefinition::Type(ty) => {
                let ty = ty.node;
                let name = ty.name.node.to_string();
                let description = ty.description.map(|d| d.node);

                let parsed = match ty.kind {
                    TypeKind::Scalar => Definition::Scalar(description),
                    TypeKind::Object(object) => Definition::Object(object_def(
                        description,
                        object.implements.into_iter().map(|i| i.node.to_string()).collect(),
                        object.fields.into_iter().map(|f| f.node).collect(),
                    )),
                    TypeKind::Interface(interface) => Definition::Interface(object_def(
                        description,
                        interface
                            .implements
                            .into_iter()
                            .map(|i| i.node.to_string())
                            .collect(),
                        interface.fields.into_iter().map(|f| f.node).collect(),
                    )),
                    TypeKind::Union(union) => Definition::Union(
                        union.members.into_iter().map(|m| m.node.to_string()).collect(),
                    ),
                    TypeKind::Enum(enum_type) => Definition::Enum(
                        enum_type
                            .values
                            .into_iter()
                            .map(|v| v.node.value.node.to_string())
                            .collect(),
                    ),
                    TypeKind::InputObject(input) => Definition::InputObject(
                        input.fields.into_iter().map(|f| f.node).collect(),
                    ),
                };

                match definitions.get_mut(&name) {
                    Some(existing) => existing.merge(parsed)?,
                    None if ty.extend => {
                        return Err(SchemaBuildError::Build(format!(
                            "cannot extend undefined type '{}'",
                            name
                        )))
                    }
                    None => {
                        order.push(name.clone());
                        definitions.insert(name, parsed);
                    }
                }
            }
            TypeSystemDefinition::Directive(directive) => {
                debug!(directive = %directive.node.name.node, "Skipping directive definition");
            }
        }
    }

    let query = query.unwrap_or_else(|| "Query".to_string());
    if !matches!(definitions.get(&query), Some(Definition::Object(_))) {
        return Err(SchemaBuildError::MissingQueryRoot(query));
    }

    let mutation = mutation.or_else(|| {
        matches!(definitions.get("Mutation"), Some(Definition::Object(_)))
            .then(|| "Mutation".to_string())
    });

    Ok(ParsedSchema {
        query,
        mutation,
        order,
        definitions,
    })
}

fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::Named(name.to_string().into()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let mut input = InputValue::new(definition.name.node.to_string(), type_ref(&definition.ty.node));
    if let Some(description) = &definition.description {
        input = input.description(description.node.clone());
    }
    if let Some(default) = &definition.default_value {
        input = input.default_value(default.node.clone());
    }
    input
}

fn uses_upload(definitions: &HashMap<String, Definition>) -> bool {
    fn named(ty: &Type) -> &str {
        match &ty.base {
            BaseType::Named(name) => name.as_str(),
            BaseType::List(inner) => named(inner),
        }
    }

    definitions.iter().any(|(name, definition)| {
        name == UPLOAD_SCALAR
            || match definition {
                Definition::Object(object) | Definition::Interface(object) => {
                    object.fields.iter().any(|field| {
                        field
                            .arguments
                            .iter()
                            .any(|arg| named(&arg.node.ty.node) == UPLOAD_SCALAR)
                    })
                }
                Definition::InputObject(fields) => fields
                    .iter()
                    .any(|field| named(&field.ty.node) == UPLOAD_SCALAR),
                _ => false,
            }
    })
}

fn build_kinds(parsed: &ParsedSchema) -> HashMap<String, Kind> {
    let mut kinds = HashMap::new();
    for name in &parsed.order {
        let kind = match &parsed.definitions[name] {
            Definition::Scalar(_) => Kind::Scalar,
            Definition::Object(_) => Kind::Object,
            Definition::Interface(_) => {
                let implementors = parsed
                    .order
                    .iter()
                    .filter(|candidate| match &parsed.definitions[*candidate] {
                        Definition::Object(object) => object.implements.contains(name),
                        _ => false,
                    })
                    .cloned()
                    .collect();
                Kind::Interface(implementors)
            }
            Definition::Union(members) => Kind::Union(members.clone()),
            Definition::Enum(values) => Kind::Enum(values.clone()),
            Definition::InputObject(_) => Kind::InputObject,
        };
        kinds.insert(name.clone(), kind);
    }
    kinds
}

/// Build a schema from SDL, real resolvers and mock overrides.
///
/// The returned builder still accepts data, limits and other settings before
/// `finish()` is called.
pub fn build(
    sdl: &str,
    resolvers: &ResolverMap,
    mocks: MockRegistry,
    options: MockOptions,
) -> Result<SchemaBuilder, SchemaBuildError> {
    let parsed = parse(sdl)?;

    for (type_name, field_name) in resolvers.keys() {
        let known = match parsed.definitions.get(type_name) {
            Some(Definition::Object(object)) => object
                .fields
                .iter()
                .any(|field| field.name.node.as_str() == field_name),
            _ => false,
        };
        if !known {
            warn!(type_name = %type_name, field = %field_name, "Resolver has no matching schema field");
        }
    }

    let engine = Arc::new(MockEngine {
        kinds: build_kinds(&parsed),
        mocks,
        enabled: options.mocks,
    });

    let mut builder = Schema::build(&parsed.query, parsed.mutation.as_deref(), None);
    if uses_upload(&parsed.definitions) {
        builder = builder.enable_uploading();
    }

    let mut mocked_fields = 0usize;

    for name in &parsed.order {
        match &parsed.definitions[name] {
            Definition::Scalar(description) => {
                if name == UPLOAD_SCALAR || is_builtin_scalar(name) {
                    continue;
                }
                let mut scalar = Scalar::new(name.as_str());
                if let Some(description) = description {
                    scalar = scalar.description(description.as_str());
                }
                builder = builder.register(scalar);
            }
            Definition::Object(object) => {
                let mut ty = Object::new(name.as_str());
                if let Some(description) = &object.description {
                    ty = ty.description(description.as_str());
                }
                for interface in &object.implements {
                    ty = ty.implement(interface.as_str());
                }

                for definition in &object.fields {
                    let field_name = definition.name.node.to_string();
                    let resolver = if options.preserve_resolvers {
                        resolvers.get(name, &field_name).cloned()
                    } else {
                        None
                    };
                    if resolver.is_none() {
                        mocked_fields += 1;
                    }

                    let plan = Arc::new(FieldPlan {
                        type_name: name.clone(),
                        field_name: field_name.clone(),
                        shape: Shape::of(&definition.ty.node),
                        resolver,
                        engine: Arc::clone(&engine),
                    });

                    let mut field = Field::new(
                        field_name,
                        type_ref(&definition.ty.node),
                        move |ctx| plan.resolve(ctx),
                    );
                    if let Some(description) = &definition.description {
                        field = field.description(description.node.as_str());
                    }
                    for argument in &definition.arguments {
                        field = field.argument(input_value(&argument.node));
                    }
                    ty = ty.field(field);
                }

                builder = builder.register(ty);
            }
            Definition::Interface(interface) => {
                let mut ty = Interface::new(name.as_str());
                if let Some(description) = &interface.description {
                    ty = ty.description(description.as_str());
                }
                for parent in &interface.implements {
                    ty = ty.implement(parent.as_str());
                }
                for definition in &interface.fields {
                    let mut field = InterfaceField::new(
                        definition.name.node.to_string(),
                        type_ref(&definition.ty.node),
                    );
                    for argument in &definition.arguments {
                        field = field.argument(input_value(&argument.node));
                    }
                    ty = ty.field(field);
                }
                builder = builder.register(ty);
            }
            Definition::Union(members) => {
                let ty = members
                    .iter()
                    .fold(Union::new(name.as_str()), |ty, member| {
                        ty.possible_type(member.as_str())
                    });
                builder = builder.register(ty);
            }
            Definition::Enum(values) => {
                let ty = values
                    .iter()
                    .fold(Enum::new(name.as_str()), |ty, value| {
                        ty.item(EnumItem::new(value.as_str()))
                    });
                builder = builder.register(ty);
            }
            Definition::InputObject(fields) => {
                let ty = fields
                    .iter()
                    .fold(InputObject::new(name.as_str()), |ty, field| {
                        ty.field(input_value(field))
                    });
                builder = builder.register(ty);
            }
        }
    }

    debug!(
        types = parsed.order.len(),
        resolvers = resolvers.len(),
        mocked_fields,
        "Built schema from type definitions"
    );

    Ok(builder)
}
