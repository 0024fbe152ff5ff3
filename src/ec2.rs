//! AWS EC2 implementation of the image directory capability.
//!
//! The client owns a current-thread tokio runtime and blocks on the SDK
//! internally, so callers stay synchronous. Per-region EC2 clients are
//! built lazily and cached; when a role ARN is configured, credentials
//! come from an STS assume-role provider.

use crate::directory::{ImageDirectory, ImageRecord};
use crate::errors::{Error, Result};
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::operation::describe_images::DescribeImagesError;
use aws_sdk_ec2::types::{Filter, Image};
use aws_sdk_ec2::Client;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use tokio::runtime::Runtime;

const DEFAULT_SESSION_NAME: &str = "UpdateToLatestAMI";

/// Synchronous image directory backed by the EC2 `DescribeImages` API.
pub struct Ec2ImageDirectory {
    runtime: Runtime,
    base: SdkConfig,
    role_arn: Option<String>,
    clients: RefCell<HashMap<String, Client>>,
}

impl Ec2ImageDirectory {
    /// Loads the shared AWS configuration for `profile` and prepares the
    /// blocking runtime. Regional clients are not built until the first
    /// query.
    pub fn new(profile: &str, role_arn: Option<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let base = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .profile_name(profile)
                .load(),
        );

        Ok(Self {
            runtime,
            base,
            role_arn,
            clients: RefCell::new(HashMap::new()),
        })
    }

    /// The region configured in the profile or environment.
    pub fn default_region(&self) -> Result<String> {
        self.base
            .region()
            .map(|region| region.to_string())
            .ok_or(Error::NoRegion)
    }

    /// The role to assume, from explicit configuration or `AWS_ROLE_ARN`.
    fn effective_role_arn(&self) -> Option<String> {
        self.role_arn
            .clone()
            .filter(|arn| !arn.is_empty())
            .or_else(|| env::var("AWS_ROLE_ARN").ok().filter(|arn| !arn.is_empty()))
    }

    fn client_for(&self, region: &str) -> Result<Client> {
        if let Some(client) = self.clients.borrow().get(region) {
            return Ok(client.clone());
        }

        let client = self.runtime.block_on(self.build_client(region));
        self.clients
            .borrow_mut()
            .insert(region.to_string(), client.clone());
        Ok(client)
    }

    async fn build_client(&self, region: &str) -> Client {
        let region = Region::new(region.to_string());
        let mut builder = aws_sdk_ec2::config::Builder::from(&self.base).region(region.clone());

        if let Some(role_arn) = self.effective_role_arn() {
            let session_name = env::var("AWS_ROLE_SESSION_NAME")
                .ok()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());

            let mut provider = AssumeRoleProvider::builder(role_arn)
                .configure(&self.base)
                .region(region)
                .session_name(session_name);

            if let Ok(external_id) = env::var("AWS_ROLE_EXTERNAL_ID") {
                if !external_id.is_empty() {
                    provider = provider.external_id(external_id);
                }
            }

            builder = builder.credentials_provider(provider.build().await);
        }

        Client::from_conf(builder.build())
    }
}

impl ImageDirectory for Ec2ImageDirectory {
    fn find_by_id(
        &self,
        owner: &str,
        region: &str,
        image_id: &str,
    ) -> Result<Option<ImageRecord>> {
        let client = self.client_for(region)?;

        let response = self.runtime.block_on(
            client
                .describe_images()
                .image_ids(image_id)
                .owners(owner)
                .send(),
        );

        let output = match response {
            Ok(output) => output,
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(query_error(err)),
        };

        let Some(image) = output.images().first() else {
            return Ok(None);
        };

        image_record(image, owner, region)
            .ok_or_else(|| {
                Error::Query(format!(
                    "image {image_id} carries unusable metadata (missing id or creation date)"
                ))
            })
            .map(Some)
    }

    fn find_by_name(&self, owner: &str, region: &str, pattern: &str) -> Result<Vec<ImageRecord>> {
        let client = self.client_for(region)?;

        let name_filter = Filter::builder().name("name").values(pattern).build();
        let output = self
            .runtime
            .block_on(
                client
                    .describe_images()
                    .filters(name_filter)
                    .owners(owner)
                    .send(),
            )
            .map_err(query_error)?;

        // Records with unparsable metadata are unusable data, not errors.
        Ok(output
            .images()
            .iter()
            .filter_map(|image| image_record(image, owner, region))
            .collect())
    }
}

/// Converts an SDK image into a record; `None` when the id or creation
/// timestamp is missing or unparsable.
fn image_record(image: &Image, owner: &str, region: &str) -> Option<ImageRecord> {
    let created_at = DateTime::parse_from_rfc3339(image.creation_date()?)
        .ok()?
        .with_timezone(&Utc);

    Some(ImageRecord {
        image_id: image.image_id()?.to_string(),
        name: image.name().unwrap_or_default().to_string(),
        created_at,
        owner: owner.to_string(),
        region: region.to_string(),
    })
}

/// Whether a describe failure means "this image id does not exist" rather
/// than a transport or auth problem.
fn is_not_found(err: &SdkError<DescribeImagesError>) -> bool {
    let Some(service_err) = err.as_service_error() else {
        return false;
    };

    service_err
        .code()
        .is_some_and(|code| code == "InvalidAMIID.NotFound")
        || service_err
            .message()
            .is_some_and(|message| message.contains("does not exist"))
}

fn query_error(err: SdkError<DescribeImagesError>) -> Error {
    Error::Query(DisplayErrorContext(err).to_string())
}
