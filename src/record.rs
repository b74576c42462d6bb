//! Record schemas.
//!
//! Record types describe themselves once through a [`Schema`]: typed field
//! accessors, the directive attached to each field, and named single-argument
//! callbacks. The engine keeps the resulting capability tables in a
//! [`RecordRegistry`] keyed by type, so batches can hold records of several
//! types behind `&mut dyn Any`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::directive::Directive;
use crate::error::{CombineError, Result};
use crate::value::{CoerceError, FieldValue, FromFieldValue};

/// Types that can be stored in a record field.
pub trait FieldType: Clone + Default + Into<FieldValue> + FromFieldValue + 'static {}

impl<T> FieldType for T where T: Clone + Default + Into<FieldValue> + FromFieldValue + 'static {}

/// A structured item the engine can read directives from and write results to.
///
/// # Example
///
/// ```
/// use combine::{Record, Schema};
///
/// #[derive(Default)]
/// struct User {
///     name: String,
///     score: f64,
/// }
///
/// impl Record for User {
///     fn schema() -> Schema<Self> {
///         Schema::new("User")
///             .tagged_field("Name", "uppercase", |u: &User| &u.name, |u: &mut User| &mut u.name)
///             .field("Score", |u: &User| &u.score, |u: &mut User| &mut u.score)
///             .callback("SetScore", |u: &mut User, v: f64| u.score = v)
///     }
/// }
///
/// assert_eq!(User::schema().directives().count(), 1);
/// ```
pub trait Record: Any + Sized {
    fn schema() -> Schema<Self>;
}

type Getter<R> = Box<dyn Fn(&R) -> FieldValue + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, Option<FieldValue>) -> std::result::Result<(), CoerceError> + Send + Sync>;

/// One declared field of a record type.
pub struct FieldSpec<R> {
    name: &'static str,
    tag: Option<&'static str>,
    directive: Option<Directive>,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R> FieldSpec<R> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw directive string as declared.
    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }

    /// Parsed directive; `None` for untagged or malformed tags.
    pub fn directive(&self) -> Option<&Directive> {
        self.directive.as_ref()
    }
}

impl<R> fmt::Debug for FieldSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("directive", &self.directive)
            .finish()
    }
}

/// Capability table of a record type.
pub struct Schema<R> {
    type_name: &'static str,
    fields: IndexMap<&'static str, FieldSpec<R>>,
    callbacks: IndexMap<&'static str, Setter<R>>,
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.values().collect::<Vec<_>>())
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<R: 'static> Schema<R> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: IndexMap::new(),
            callbacks: IndexMap::new(),
        }
    }

    /// Declare a field without a directive. It can still receive results
    /// routed from other fields.
    pub fn field<T: FieldType>(
        self,
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.push_field(name, None, get, get_mut)
    }

    /// Declare a field carrying a directive such as `"uppercase,Name"`.
    pub fn tagged_field<T: FieldType>(
        self,
        name: &'static str,
        tag: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        self.push_field(name, Some(tag), get, get_mut)
    }

    /// Declare a named output callback taking one argument.
    ///
    /// An absent result is passed as `T::default()`.
    pub fn callback<T, F>(mut self, name: &'static str, callback: F) -> Self
    where
        T: FromFieldValue + Default + 'static,
        F: Fn(&mut R, T) + Send + Sync + 'static,
    {
        let invoke: Setter<R> = Box::new(
            move |record: &mut R, value: Option<FieldValue>| -> std::result::Result<(), CoerceError> {
                let arg = match value {
                    Some(value) => T::from_field_value(value)?,
                    None => T::default(),
                };
                callback(record, arg);
                Ok(())
            },
        );
        self.callbacks.insert(name, invoke);
        self
    }

    fn push_field<T: FieldType>(
        mut self,
        name: &'static str,
        tag: Option<&'static str>,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        let directive = tag.and_then(|raw| {
            let parsed = Directive::parse(raw);
            if parsed.is_none() {
                tracing::debug!(
                    "Ignoring malformed directive {:?} on {}.{}",
                    raw,
                    self.type_name,
                    name
                );
            }
            parsed
        });

        let spec = FieldSpec {
            name,
            tag,
            directive,
            get: Box::new(move |record: &R| -> FieldValue { get(record).clone().into() }),
            set: Box::new(
                move |record: &mut R, value: Option<FieldValue>| -> std::result::Result<(), CoerceError> {
                    *get_mut(record) = match value {
                        Some(value) => T::from_field_value(value)?,
                        None => T::default(),
                    };
                    Ok(())
                },
            ),
        };
        self.fields.insert(name, spec);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec<R>> {
        self.fields.values()
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec<R>> {
        self.fields.get(name)
    }

    pub fn has_callback(&self, name: &str) -> bool {
        self.callbacks.contains_key(name)
    }

    /// Fields carrying a valid directive, with their declaration position.
    pub fn directives(&self) -> impl Iterator<Item = (usize, &FieldSpec<R>, &Directive)> {
        self.fields
            .values()
            .enumerate()
            .filter_map(|(index, spec)| spec.directive.as_ref().map(|d| (index, spec, d)))
    }

    /// Read the field at `index` as a [`FieldValue`].
    pub fn read(&self, record: &R, index: usize) -> Option<FieldValue> {
        self.fields
            .get_index(index)
            .map(|(_, spec)| (spec.get)(record))
    }

    /// Assign `value` to the named field; `None` assigns the default.
    pub fn write(&self, record: &mut R, field: &str, value: Option<FieldValue>) -> Result<()> {
        let spec = self
            .fields
            .get(field)
            .ok_or_else(|| CombineError::FieldNotFound {
                record: self.type_name,
                field: field.to_string(),
            })?;

        (spec.set)(record, value).map_err(|source| CombineError::TypeMismatch {
            record: self.type_name,
            field: field.to_string(),
            source,
        })
    }

    /// Invoke the named callback with `value`; `None` passes the default.
    pub fn invoke(&self, record: &mut R, method: &str, value: Option<FieldValue>) -> Result<()> {
        let callback = self
            .callbacks
            .get(method)
            .ok_or_else(|| CombineError::MethodNotFound {
                record: self.type_name,
                method: method.to_string(),
            })?;

        callback(record, value).map_err(|source| CombineError::ParameterTypeMismatch {
            record: self.type_name,
            method: method.to_string(),
            source,
        })
    }
}

/// A field occurrence with a parsed directive.
#[derive(Debug, Clone)]
pub(crate) struct TaggedField {
    pub index: usize,
    pub name: &'static str,
    pub directive: Directive,
}

/// Type-erased view over a [`Schema`].
pub(crate) trait RecordAccess: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn tagged_fields(&self) -> &[TaggedField];

    fn read(&self, item: &dyn Any, index: usize) -> Option<FieldValue>;

    fn write(&self, item: &mut dyn Any, field: &str, value: Option<FieldValue>) -> Result<()>;

    fn invoke(&self, item: &mut dyn Any, method: &str, value: Option<FieldValue>) -> Result<()>;
}

struct TypedAccess<R> {
    schema: Schema<R>,
    tagged: Vec<TaggedField>,
}

impl<R: Record> TypedAccess<R> {
    fn new(schema: Schema<R>) -> Self {
        let tagged = schema
            .directives()
            .map(|(index, spec, directive)| TaggedField {
                index,
                name: spec.name,
                directive: directive.clone(),
            })
            .collect();
        Self { schema, tagged }
    }

    fn view(item: &dyn Any) -> Option<&R> {
        item.downcast_ref::<R>()
            .or_else(|| item.downcast_ref::<Box<R>>().map(|boxed| &**boxed))
    }

    fn view_mut(item: &mut dyn Any) -> Option<&mut R> {
        if item.is::<R>() {
            return item.downcast_mut::<R>();
        }
        item.downcast_mut::<Box<R>>().map(|boxed| &mut **boxed)
    }

    fn foreign(&self) -> CombineError {
        CombineError::RecordTypeMismatch {
            record: self.schema.type_name,
        }
    }
}

impl<R: Record> RecordAccess for TypedAccess<R> {
    fn type_name(&self) -> &'static str {
        self.schema.type_name
    }

    fn tagged_fields(&self) -> &[TaggedField] {
        &self.tagged
    }

    fn read(&self, item: &dyn Any, index: usize) -> Option<FieldValue> {
        Self::view(item).and_then(|record| self.schema.read(record, index))
    }

    fn write(&self, item: &mut dyn Any, field: &str, value: Option<FieldValue>) -> Result<()> {
        match Self::view_mut(item) {
            Some(record) => self.schema.write(record, field, value),
            None => Err(self.foreign()),
        }
    }

    fn invoke(&self, item: &mut dyn Any, method: &str, value: Option<FieldValue>) -> Result<()> {
        match Self::view_mut(item) {
            Some(record) => self.schema.invoke(record, method, value),
            None => Err(self.foreign()),
        }
    }
}

/// Record capability tables keyed by type.
#[derive(Default)]
pub struct RecordRegistry {
    types: RwLock<HashMap<TypeId, Arc<dyn RecordAccess>>>,
}

impl fmt::Debug for RecordRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .types
            .read()
            .map(|types| {
                let mut names: Vec<_> = types.values().map(|a| a.type_name()).collect();
                names.sort_unstable();
                names.dedup();
                names
            })
            .unwrap_or_default();
        f.debug_struct("RecordRegistry").field("types", &names).finish()
    }
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and install the capability table for `R`, replacing any previous one.
    ///
    /// Both `R` and `Box<R>` batch elements resolve to the table.
    pub fn register<R: Record>(&self) {
        let access: Arc<dyn RecordAccess> = Arc::new(TypedAccess::<R>::new(R::schema()));
        tracing::debug!(
            "Registering record type {} with {} tagged field(s)",
            access.type_name(),
            access.tagged_fields().len()
        );

        let mut types = self.types.write().expect("record registry lock poisoned");
        types.insert(TypeId::of::<R>(), Arc::clone(&access));
        types.insert(TypeId::of::<Box<R>>(), access);
    }

    /// Install the table for `R` unless one exists already.
    pub fn ensure<R: Record>(&self) {
        if !self.contains::<R>() {
            self.register::<R>();
        }
    }

    pub fn contains<R: Record>(&self) -> bool {
        self.types
            .read()
            .expect("record registry lock poisoned")
            .contains_key(&TypeId::of::<R>())
    }

    pub(crate) fn resolve(&self, item: &dyn Any) -> Option<Arc<dyn RecordAccess>> {
        self.types
            .read()
            .expect("record registry lock poisoned")
            .get(&item.type_id())
            .cloned()
    }
}
