//! Newtype domain identifiers.
//!
//! Every named concept that crosses a crate boundary is a distinct newtype
//! wrapping a string, so a [`ProjectName`] can never be passed where a
//! [`DomainName`] is expected even though both are strings underneath.
//!
//! String identifiers reject the empty string both at construction and when
//! deserialised.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and
// serde conversions that reject empty values.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or_else(|| {
                    format!("{} must not be empty", stringify!($name))
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// The project an execution, workflow, or launch plan belongs to.
    ProjectName
}

string_id! {
    /// The domain (e.g. `"development"`, `"production"`) within a project.
    DomainName
}

string_id! {
    /// The engine-assigned name of one workflow execution.
    ExecutionName
}

string_id! {
    /// The registered name of a workflow definition.
    WorkflowName
}

string_id! {
    /// The registered name of a launch plan.
    LaunchPlanName
}

string_id! {
    /// A notification recipient.
    ///
    /// The syntactic meaning depends on the channel: an email address, a
    /// Slack channel or user handle, or a PagerDuty integration key. Channel
    /// specific validation happens when a rule is constructed.
    Recipient
}

// ---------------------------------------------------------------------------
// Composite identifiers
// ---------------------------------------------------------------------------

/// Fully qualified identity of a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId {
    pub project: ProjectName,
    pub domain: DomainName,
    pub name: ExecutionName,
}

impl ExecutionId {
    pub fn new(project: ProjectName, domain: DomainName, name: ExecutionName) -> Self {
        Self {
            project,
            domain,
            name,
        }
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.domain, self.name)
    }
}

/// Stable identity of one notification rule: the launch plan that declares
/// it plus its position in the declaration order.
///
/// Used to shard the delivery queue (events for one rule stay ordered) and
/// to key the fired-ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleKey {
    pub project: ProjectName,
    pub domain: DomainName,
    pub launch_plan: LaunchPlanName,
    pub index: usize,
}

impl std::fmt::Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}#{}",
            self.project, self.domain, self.launch_plan, self.index
        )
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one enqueued notification event.
///
/// Generated when the event is created; propagated through spans and dead
/// letters so every attempt for the same event can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`DeliveryId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
