//! Logical service identifiers and base-URL resolution.
//!
//! Every Globular service is reachable under one base URL; the identifier picks the path suffix
//! and the method table. The base URL is chosen in this order: explicit per-call override,
//! persisted setting, configured origin, then [`DEFAULT_BASE_URL`].

// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ConfigError,
	rpc::MethodKind,
	store::SettingsStore,
};

/// Base URL used when neither an override, a persisted setting, nor an origin is available.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Logical identifier of a Globular backend service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceId {
	/// `authentication.AuthenticationService`
	Authentication,
	/// `rbac.RbacService`
	Rbac,
	/// `resource.ResourceService`
	Resource,
	/// `file.FileService`
	File,
	/// `event.EventService`
	Event,
}
impl ServiceId {
	/// Every known service, in table order.
	pub const ALL: [ServiceId; 5] =
		[Self::Authentication, Self::Rbac, Self::Resource, Self::File, Self::Event];

	/// Returns the fully qualified identifier (e.g. `rbac.RbacService`).
	pub const fn as_str(self) -> &'static str {
		self.descriptor().name
	}

	/// Returns the static descriptor for this service.
	pub const fn descriptor(self) -> &'static ServiceDescriptor {
		match self {
			Self::Authentication => &AUTHENTICATION,
			Self::Rbac => &RBAC,
			Self::Resource => &RESOURCE,
			Self::File => &FILE,
			Self::Event => &EVENT,
		}
	}
}
impl Display for ServiceId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ServiceId {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|id| id.as_str() == s)
			.ok_or_else(|| Error::UnknownService { service: s.to_owned() })
	}
}
impl TryFrom<String> for ServiceId {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		value.parse()
	}
}
impl From<ServiceId> for String {
	fn from(value: ServiceId) -> Self {
		value.as_str().to_owned()
	}
}

/// Path suffix and method table of one service.
#[derive(Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
	/// Fully qualified service name.
	pub name: &'static str,
	/// Suffix appended to the base URL.
	pub path: &'static str,
	/// Unary method names.
	pub unary: &'static [&'static str],
	/// Server-streaming method names.
	pub server_streaming: &'static [&'static str],
}
impl ServiceDescriptor {
	/// Returns the shape of `method`, or `None` if the service does not expose it.
	pub fn method_kind(&self, method: &str) -> Option<MethodKind> {
		if self.unary.contains(&method) {
			Some(MethodKind::Unary)
		} else if self.server_streaming.contains(&method) {
			Some(MethodKind::ServerStreaming)
		} else {
			None
		}
	}
}

const AUTHENTICATION: ServiceDescriptor = ServiceDescriptor {
	name: "authentication.AuthenticationService",
	path: "/authentication.AuthenticationService",
	unary: &[
		"Authenticate",
		"RefreshToken",
		"ValidateToken",
		"SetPassword",
		"SetRootPassword",
		"SetRootEmail",
		"GeneratePeerToken",
	],
	server_streaming: &[],
};
const RBAC: ServiceDescriptor = ServiceDescriptor {
	name: "rbac.RbacService",
	path: "/rbac.RbacService",
	unary: &[
		"GetResourcePermissions",
		"SetResourcePermissions",
		"DeleteResourcePermissions",
		"SetResourcePermission",
		"DeleteResourcePermission",
		"GetActionResourceInfos",
		"SetActionResourcesPermissions",
		"ValidateAccess",
		"ValidateAction",
		"GetSharedResource",
		"RemoveSubjectFromShare",
		"DeleteSubjectShare",
	],
	server_streaming: &["GetResourcePermissionsByResourceType"],
};
const RESOURCE: ServiceDescriptor = ServiceDescriptor {
	name: "resource.ResourceService",
	path: "/resource.ResourceService",
	unary: &[
		"RegisterAccount",
		"DeleteAccount",
		"CreateGroup",
		"UpdateGroup",
		"DeleteGroup",
		"AddGroupMemberAccount",
		"RemoveGroupMemberAccount",
		"CreateOrganization",
		"UpdateOrganization",
		"DeleteOrganization",
		"AddOrganizationAccount",
		"RemoveOrganizationAccount",
		"AddOrganizationGroup",
		"RemoveOrganizationGroup",
		"AddOrganizationRole",
		"RemoveOrganizationRole",
		"CreateRole",
		"UpdateRole",
		"DeleteRole",
		"AddAccountRole",
		"RemoveAccountRole",
		"AddRoleActions",
		"RemoveRoleAction",
	],
	server_streaming: &["GetAccounts", "GetGroups", "GetOrganizations", "GetRoles", "GetPeers"],
};
const FILE: ServiceDescriptor = ServiceDescriptor {
	name: "file.FileService",
	path: "/file.FileService",
	unary: &[
		"CreateDir",
		"DeleteDir",
		"DeleteFile",
		"Rename",
		"Move",
		"Copy",
		"CreateLink",
		"GetFileInfo",
	],
	server_streaming: &["ReadDir", "ReadFile"],
};
const EVENT: ServiceDescriptor = ServiceDescriptor {
	name: "event.EventService",
	path: "/event.EventService",
	unary: &["Subscribe", "UnSubscribe", "Publish", "Quit"],
	server_streaming: &["OnEvent"],
};

/// Resolves the base URL and per-service addresses.
#[derive(Clone, Default)]
pub struct AddressResolver {
	origin: Option<Url>,
	settings: Option<Arc<dyn SettingsStore>>,
}
impl AddressResolver {
	/// Creates a resolver that falls back straight to [`DEFAULT_BASE_URL`].
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a resolver from the `origin` of a [`ClientConfig`].
	pub fn from_config(config: &ClientConfig) -> Self {
		Self { origin: config.origin.clone(), settings: None }
	}

	/// Sets the origin used when no override or persisted setting applies.
	pub fn with_origin(mut self, origin: Url) -> Self {
		self.origin = Some(origin);

		self
	}

	/// Consults `settings` for a persisted base URL.
	pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
		self.settings = Some(settings);

		self
	}

	/// Picks the base URL: override, persisted setting, origin, then [`DEFAULT_BASE_URL`].
	///
	/// A settings store that fails to load is treated as holding no base URL.
	pub fn base_url(&self, override_url: Option<&Url>) -> Result<Url> {
		if let Some(url) = override_url {
			return Ok(url.clone());
		}
		if let Some(url) = self.persisted_base_url() {
			return Ok(url);
		}
		if let Some(url) = &self.origin {
			return Ok(url.clone());
		}

		parse_url(DEFAULT_BASE_URL)
	}

	/// Resolves the address of `service` under the selected base URL.
	pub fn resolve(&self, service: &str, override_url: Option<&Url>) -> Result<Url> {
		let id = service.parse::<ServiceId>()?;

		self.resolve_id(id, override_url)
	}

	/// Resolves the address of a typed service identifier.
	pub fn resolve_id(&self, id: ServiceId, override_url: Option<&Url>) -> Result<Url> {
		let base = self.base_url(override_url)?;

		parse_url(&format!("{}{}", base.as_str().trim_end_matches('/'), id.descriptor().path))
	}

	fn persisted_base_url(&self) -> Option<Url> {
		let store = self.settings.as_ref()?;

		store.load().ok()?.base_url
	}
}
impl Debug for AddressResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AddressResolver")
			.field("origin", &self.origin)
			.field("settings_set", &self.settings.is_some())
			.finish()
	}
}

fn parse_url(value: &str) -> Result<Url> {
	Url::parse(value)
		.map_err(|source| ConfigError::InvalidBaseUrl { value: value.to_owned(), source }.into())
}
