mod binddefinition;
mod conditions;
mod roledefinition;
mod webhookauthorizer;

pub use binddefinition::*;
pub use conditions::*;
pub use roledefinition::*;
pub use webhookauthorizer::*;

/// Label applied to every child resource generated by this operator.
pub const CREATED_BY_LABEL: &str = "app.kubernetes.io/created-by";

/// Annotation recording the owning parent's kind, so that a generated object can be traced
/// back to its RoleDefinition/BindDefinition without a live owner-reference lookup.
pub const PARENT_KIND_ANNOTATION: &str = "rbac-operator.io/parent-kind";

/// Annotation recording the owning parent's name.
pub const PARENT_NAME_ANNOTATION: &str = "rbac-operator.io/parent-name";
