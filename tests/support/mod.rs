#![allow(dead_code)]

use odata_filter::schema::{Describe, EdmType, SchemaBuilder, StructuredType};
use odata_filter::SchemaModel;
use tracing_subscriber::EnvFilter;

/// Sample directory user used across the integration suites.
pub struct User;

impl Describe for User {
    const TYPE_NAME: &'static str = "User";

    fn describe(builder: SchemaBuilder) -> SchemaBuilder {
        builder
            .with_enum("UserType", ["Guest", "Employee", "Contractor"])
            .with_complex(
                StructuredType::new("PersonName")
                    .with_property("givenName", EdmType::string())
                    .with_property("nickName", EdmType::string())
                    .with_property("surname", EdmType::string())
                    .with_property("middleInitial", EdmType::string()),
            )
            .with_complex(
                StructuredType::new("SocialLogin")
                    .with_property("name", EdmType::string())
                    .with_property("url", EdmType::string()),
            )
            .with_entity(
                StructuredType::new("User")
                    .with_key("id")
                    .with_property("id", EdmType::int32())
                    .with_property("type", EdmType::enumeration("UserType"))
                    .with_property("name", EdmType::complex("PersonName"))
                    .with_property("displayName", EdmType::string())
                    .with_property("email", EdmType::string())
                    .with_property("enabled", EdmType::boolean())
                    .with_property("createDate", EdmType::date_time_offset())
                    .with_property("sponsor", EdmType::entity("User"))
                    .with_property("phoneNumbers", EdmType::collection(EdmType::string()))
                    .with_property(
                        "socialLogins",
                        EdmType::collection(EdmType::complex("SocialLogin")),
                    ),
            )
    }
}

pub fn user_schema() -> SchemaModel {
    SchemaModel::describe::<User>().expect("user schema builds")
}

/// Installs a test subscriber honoring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
