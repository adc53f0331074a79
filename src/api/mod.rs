pub mod resource;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use validator::Validate;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{
    AgendaEvent, AgendaFilter, AttendanceRecord, Estudiante, GroupId, Member, MemberId,
    NewParentLink, PadreEstudiante, Paralelo, ParentLinkFilter, ProfesorCurso,
    ProfesorCursoDetalle, Relation, SaveAttendanceRequest, SaveAttendanceResponse,
    UpdateEstudianteRequest,
};

pub use resource::Resource;

/// Backend operations the reconciliation services depend on.
#[async_trait]
pub trait SchoolApi: Send + Sync {
    async fn fetch_paralelos(&self) -> Result<Vec<Paralelo>, AppError>;

    /// Every student or subject, regardless of membership.
    async fn fetch_roster(&self, relation: Relation) -> Result<Vec<Member>, AppError>;

    async fn fetch_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
    ) -> Result<Vec<Member>, AppError>;

    async fn attach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError>;

    async fn detach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError>;

    /// Server-side replacement of the whole membership set.
    async fn replace_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_ids: &[MemberId],
    ) -> Result<Vec<Member>, AppError>;

    async fn fetch_parent_links(
        &self,
        filter: ParentLinkFilter,
    ) -> Result<Vec<PadreEstudiante>, AppError>;

    async fn create_parent_link(&self, link: NewParentLink) -> Result<PadreEstudiante, AppError>;

    async fn delete_parent_link(&self, link_id: i64) -> Result<(), AppError>;

    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        paralelo_id: GroupId,
    ) -> Result<AttendanceRecord, AppError>;

    async fn save_attendance(
        &self,
        request: &SaveAttendanceRequest,
    ) -> Result<SaveAttendanceResponse, AppError>;

    async fn fetch_attendance_history(&self) -> Result<Vec<AttendanceRecord>, AppError>;
}

pub struct HttpSchoolApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSchoolApi {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, AppError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| AppError::Config(format!("Invalid API URL {}: {}", raw, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!("API error {}: {}", status, body);
            return Err(AppError::from_response(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
        let body = self.send(builder).await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!("Failed to parse API response: {}", e);
            AppError::Decode(e)
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = self.url(path, query)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn write_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path, &[])?;
        self.send_json(self.request(method, url).json(body)).await
    }

    async fn delete_path(&self, path: &str) -> Result<(), AppError> {
        let url = self.url(path, &[])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    pub async fn list<R: Resource>(&self) -> Result<Vec<R>, AppError> {
        self.get_json(R::PATH, &[]).await
    }

    pub async fn get<R: Resource>(&self, id: i64) -> Result<R, AppError> {
        self.get_json(&format!("{}/{}", R::PATH, id), &[]).await
    }

    /// Validates `payload` locally before anything is sent.
    pub async fn create<R: Resource>(&self, payload: &R::Request) -> Result<R, AppError> {
        payload.validate()?;
        self.write_json(Method::POST, R::PATH, payload).await
    }

    pub async fn update<R: Resource>(&self, id: i64, payload: &R::Request) -> Result<R, AppError> {
        payload.validate()?;
        self.write_json(Method::PUT, &format!("{}/{}", R::PATH, id), payload)
            .await
    }

    pub async fn delete<R: Resource>(&self, id: i64) -> Result<(), AppError> {
        self.delete_path(&format!("{}/{}", R::PATH, id)).await
    }

    /// Partial student update; blank fields are dropped before sending.
    pub async fn update_estudiante(
        &self,
        id: i64,
        payload: UpdateEstudianteRequest,
    ) -> Result<Estudiante, AppError> {
        let payload = payload.sanitized();
        if payload == UpdateEstudianteRequest::default() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        self.write_json(Method::PUT, &format!("/estudiantes/{}", id), &payload)
            .await
    }

    pub async fn list_agendas(&self, filter: &AgendaFilter) -> Result<Vec<AgendaEvent>, AppError> {
        self.get_json(AgendaEvent::PATH, &filter.query_pairs()).await
    }

    pub async fn profesor_cursos(&self) -> Result<Vec<ProfesorCurso>, AppError> {
        self.get_json("/profesor/cursos", &[]).await
    }

    pub async fn profesor_curso(&self, id: i64) -> Result<ProfesorCursoDetalle, AppError> {
        self.get_json(&format!("/profesor/cursos/{}", id), &[]).await
    }

    /// Ends the WhatsApp bridge session. The bridge lives next to the live channel,
    /// not under the REST API.
    pub async fn whatsapp_logout(&self, socket_url: &str) -> Result<(), AppError> {
        let raw = format!("{}/api/whatsapp/logout", socket_url.trim_end_matches('/'));
        let url = Url::parse(&raw)
            .map_err(|e| AppError::Config(format!("Invalid socket URL {}: {}", raw, e)))?;
        self.send(self.request(Method::POST, url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SchoolApi for HttpSchoolApi {
    async fn fetch_paralelos(&self) -> Result<Vec<Paralelo>, AppError> {
        self.list::<Paralelo>().await
    }

    async fn fetch_roster(&self, relation: Relation) -> Result<Vec<Member>, AppError> {
        self.get_json(relation.roster_path(), &[]).await
    }

    async fn fetch_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
    ) -> Result<Vec<Member>, AppError> {
        self.get_json(
            &format!("/paralelos/{}/{}", paralelo_id, relation.segment()),
            &[],
        )
        .await
    }

    async fn attach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError> {
        let url = self.url(
            &format!("/paralelos/{}/{}", paralelo_id, relation.segment()),
            &[],
        )?;
        self.send(
            self.request(Method::POST, url)
                .json(&relation.attach_body(member_id)),
        )
        .await?;
        Ok(())
    }

    async fn detach_member(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_id: MemberId,
    ) -> Result<(), AppError> {
        self.delete_path(&format!(
            "/paralelos/{}/{}/{}",
            paralelo_id,
            relation.segment(),
            member_id
        ))
        .await
    }

    async fn replace_members(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        member_ids: &[MemberId],
    ) -> Result<Vec<Member>, AppError> {
        self.write_json(
            Method::PUT,
            &format!("/paralelos/{}/{}", paralelo_id, relation.segment()),
            &relation.sync_body(member_ids),
        )
        .await
    }

    async fn fetch_parent_links(
        &self,
        filter: ParentLinkFilter,
    ) -> Result<Vec<PadreEstudiante>, AppError> {
        self.get_json("/padres-estudiantes", &filter.query_pairs())
            .await
    }

    async fn create_parent_link(&self, link: NewParentLink) -> Result<PadreEstudiante, AppError> {
        self.write_json(Method::POST, "/padres-estudiantes", &link)
            .await
    }

    async fn delete_parent_link(&self, link_id: i64) -> Result<(), AppError> {
        self.delete_path(&format!("/padres-estudiantes/{}", link_id))
            .await
    }

    async fn fetch_attendance(
        &self,
        date: NaiveDate,
        paralelo_id: GroupId,
    ) -> Result<AttendanceRecord, AppError> {
        let query = [
            ("date", date.format("%Y-%m-%d").to_string()),
            ("paralelo_id", paralelo_id.to_string()),
        ];
        self.get_json("/attendance", &query).await
    }

    async fn save_attendance(
        &self,
        request: &SaveAttendanceRequest,
    ) -> Result<SaveAttendanceResponse, AppError> {
        if request.students.is_empty() {
            return Err(AppError::BadRequest(
                "Attendance sheet has no students".to_string(),
            ));
        }
        self.write_json(Method::POST, "/attendance", request).await
    }

    async fn fetch_attendance_history(&self) -> Result<Vec<AttendanceRecord>, AppError> {
        self.get_json("/attendance/history", &[]).await
    }
}
