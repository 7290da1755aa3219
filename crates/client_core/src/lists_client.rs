use async_trait::async_trait;
use reqwest::{Client, Method};
use shared::{
    domain::{List, ListId, UserId},
    protocol::{
        CreateListRequest, ListResponse, ListsResponse, LoginRequest, LoginResponse,
        MessageResponse, UpdateListRequest,
    },
};
use tracing::info;

use crate::{
    error::ControllerError,
    http_store::HttpListItemStore,
    store::ListStore,
    transport::{send_json, HttpTransport, DEFAULT_REQUEST_TIMEOUT},
};

/// Client for list CRUD on the list server.
#[derive(Clone)]
pub struct ListsClient {
    transport: HttpTransport,
}

impl ListsClient {
    pub fn new(server_url: &str, user_id: UserId) -> Result<Self, ControllerError> {
        Ok(Self {
            transport: HttpTransport::new(server_url, user_id)?,
        })
    }

    pub fn from_transport(transport: HttpTransport) -> Self {
        Self { transport }
    }

    /// Registers (or re-uses) `username` and returns a client acting as that user.
    pub async fn login(server_url: &str, username: &str) -> Result<Self, ControllerError> {
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        let anonymous = HttpTransport::with_client(http, server_url, UserId(0))?;
        let request = anonymous
            .unauthenticated(Method::POST, &["login"])
            .json(&LoginRequest {
                username: username.to_string(),
            });
        let response: LoginResponse = send_json(request).await?;
        info!(user_id = response.user_id, %username, "logged in");
        Ok(Self {
            transport: anonymous.with_user(UserId(response.user_id)),
        })
    }

    pub fn user_id(&self) -> UserId {
        self.transport.user_id()
    }

    pub async fn lists(&self) -> Result<Vec<List>, ControllerError> {
        let response: ListsResponse =
            send_json(self.transport.request(Method::GET, &["lists"])).await?;
        Ok(response.lists)
    }

    pub async fn list(&self, list_id: &ListId) -> Result<List, ControllerError> {
        let response: ListResponse =
            send_json(self.transport.request(Method::GET, &["lists", list_id.as_str()])).await?;
        Ok(response.list)
    }

    pub async fn create_list(&self, request: CreateListRequest) -> Result<List, ControllerError> {
        request.validate().map_err(|e| ControllerError::Validation(e.message))?;
        let response: ListResponse = send_json(
            self.transport
                .request(Method::POST, &["lists"])
                .json(&request),
        )
        .await?;
        Ok(response.list)
    }

    pub async fn update_list(
        &self,
        list_id: &ListId,
        request: UpdateListRequest,
    ) -> Result<List, ControllerError> {
        request.validate().map_err(|e| ControllerError::Validation(e.message))?;
        let response: ListResponse = send_json(
            self.transport
                .request(Method::PUT, &["lists", list_id.as_str()])
                .json(&request),
        )
        .await?;
        Ok(response.list)
    }

    pub async fn delete_list(&self, list_id: &ListId) -> Result<(), ControllerError> {
        let _: MessageResponse = send_json(
            self.transport
                .request(Method::DELETE, &["lists", list_id.as_str()]),
        )
        .await?;
        Ok(())
    }

    /// Item store sharing this client's connection pool and user.
    pub fn items_store(&self) -> HttpListItemStore {
        HttpListItemStore::new(self.transport.clone())
    }
}

#[async_trait]
impl ListStore for ListsClient {
    fn owner(&self) -> UserId {
        self.user_id()
    }

    async fn fetch_lists(&self) -> Result<Vec<List>, ControllerError> {
        self.lists().await
    }

    async fn create_list(&self, request: CreateListRequest) -> Result<List, ControllerError> {
        ListsClient::create_list(self, request).await
    }

    async fn update_list(
        &self,
        list_id: &ListId,
        request: UpdateListRequest,
    ) -> Result<List, ControllerError> {
        ListsClient::update_list(self, list_id, request).await
    }

    async fn delete_list(&self, list_id: &ListId) -> Result<(), ControllerError> {
        ListsClient::delete_list(self, list_id).await
    }
}
