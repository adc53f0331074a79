use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::models::{
    AgendaEvent, AgendaRequest, Estudiante, Materia, MateriaRequest, NewEstudianteRequest, Padre,
    PadreRequest, Paralelo, ParaleloRequest, Profesor, ProfesorRequest, Report, ReportCategory,
    ReportCategoryRequest, ReportRequest, WhatsAppTemplate, WhatsAppTemplateRequest,
};

/// A REST collection with plain CRUD semantics.
pub trait Resource: DeserializeOwned + Send + 'static {
    /// Collection path, e.g. `/paralelos`.
    const PATH: &'static str;
    /// Body accepted by create and update.
    type Request: Serialize + Validate + Send + Sync;
}

impl Resource for Paralelo {
    const PATH: &'static str = "/paralelos";
    type Request = ParaleloRequest;
}

impl Resource for Estudiante {
    const PATH: &'static str = "/estudiantes";
    type Request = NewEstudianteRequest;
}

impl Resource for Materia {
    const PATH: &'static str = "/materias";
    type Request = MateriaRequest;
}

impl Resource for Padre {
    const PATH: &'static str = "/padres";
    type Request = PadreRequest;
}

impl Resource for Profesor {
    const PATH: &'static str = "/profesores";
    type Request = ProfesorRequest;
}

impl Resource for AgendaEvent {
    const PATH: &'static str = "/agendas";
    type Request = AgendaRequest;
}

impl Resource for Report {
    const PATH: &'static str = "/reportes";
    type Request = ReportRequest;
}

impl Resource for ReportCategory {
    const PATH: &'static str = "/report-categories";
    type Request = ReportCategoryRequest;
}

impl Resource for WhatsAppTemplate {
    const PATH: &'static str = "/whatsapp-templates";
    type Request = WhatsAppTemplateRequest;
}
