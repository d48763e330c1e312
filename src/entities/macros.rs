//! Macros for reducing boilerplate when defining entities
//!
//! These macros generate the struct and the repetitive [`Entity`] trait
//! implementation needed for each stored document type.
//!
//! [`Entity`]: crate::core::entity::Entity

/// Define a stored entity with automatic trait implementations
///
/// The struct receives the base fields `id`, `created_at`, `updated_at` and
/// `version` in front of the listed fields. `Default` yields a fresh id and
/// current timestamps, so literals can be written with `..Default::default()`.
///
/// Optional settings follow the names: `kind = Product` switches keyword
/// search to title/description, `unique = ["email"]` declares unique fields.
/// A trailing block is spliced into the `Entity` impl for overrides.
///
/// # Example
///
/// ```rust,ignore
/// impl_entity!(
///     Brand, "brand", "brands",
///     unique = ["name"],
///     {
///         pub name: String,
///         #[serde(default)]
///         pub slug: String,
///     },
///     {
///         fn normalize(&mut self) {
///             self.slug = slugify(&self.name);
///         }
///     }
/// );
///
/// let brand = Brand { name: "Acme".into(), ..Default::default() };
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $(#[$meta:meta])*
        $type:ident, $singular:expr, $plural:expr
        $(, kind = $kind:ident)?
        $(, unique = [ $( $unique:expr ),* $(,)? ])?
        , {
            $( $(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_type:ty ),* $(,)?
        }
        $(, { $( $overrides:tt )* })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $type {
            /// Unique identifier for this entity
            pub id: ::uuid::Uuid,

            /// When this entity was created
            pub created_at: ::chrono::DateTime<::chrono::Utc>,

            /// When this entity was last updated
            pub updated_at: ::chrono::DateTime<::chrono::Utc>,

            /// Internal revision, bumped on every write
            #[serde(default)]
            pub version: u64,

            $( $(#[$field_meta])* $field_vis $field : $field_type ),*
        }

        impl Default for $type {
            fn default() -> Self {
                let now = ::chrono::Utc::now();
                Self {
                    id: ::uuid::Uuid::new_v4(),
                    created_at: now,
                    updated_at: now,
                    version: 0,
                    $( $field: Default::default() ),*
                }
            }
        }

        impl $crate::core::entity::Entity for $type {
            fn resource_name() -> &'static str {
                $plural
            }

            fn resource_name_singular() -> &'static str {
                $singular
            }

            $(
                fn kind() -> $crate::core::entity::EntityKind {
                    $crate::core::entity::EntityKind::$kind
                }
            )?

            $(
                fn unique_fields() -> &'static [&'static str] {
                    &[ $( $unique ),* ]
                }
            )?

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn touch(&mut self) {
                self.updated_at = ::chrono::Utc::now();
                self.version += 1;
            }

            $( $( $overrides )* )?
        }
    };
}
