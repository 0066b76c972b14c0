/// Database row types. These map directly to SQLite rows.
/// Distinct from picfest-types models to keep the DB layer independent;
/// see `convert` for the mapping.

pub struct AuthUserRow {
    pub id: String,
    pub email: String,
    pub password: String,
}

pub struct ProfileRow {
    pub id: String,
    pub role: String,
    pub nome: String,
    pub email: String,
    pub telefone: Option<String>,
    pub instagram: Option<String>,
    pub foto_perfil: Option<String>,
    pub cpf: Option<String>,
    pub data_nascimento: Option<String>,
    pub cep: Option<String>,
    pub endereco_logradouro: Option<String>,
    pub endereco_numero: Option<String>,
    pub endereco_complemento: Option<String>,
    pub endereco_bairro: Option<String>,
    pub endereco_cidade: Option<String>,
    pub endereco_estado: Option<String>,
    pub created_at: String,
}

pub struct EventRow {
    pub id: String,
    pub nome: String,
    pub slug_curto: String,
    pub data_evento: Option<String>,
    pub organizador_id: String,
    pub status: String,
    pub config_json: String,
    pub created_at: String,
}

pub struct MediaRow {
    pub id: String,
    pub evento_id: String,
    pub usuario_id: String,
    pub tipo: String,
    pub legenda: Option<String>,
    pub url: String,
    pub aprovado: bool,
    pub created_at: String,
    /// Uploader profile, when the query joined it.
    pub perfil: Option<ProfileRow>,
}

pub struct PlanRow {
    pub id: String,
    pub nome: String,
    pub limite_eventos: i64,
    pub limite_midias: i64,
    pub limite_storage: i64,
    pub permite_download: bool,
    pub valor: f64,
    pub recorrencia: String,
    pub ativo: bool,
}

pub struct SubscriptionRow {
    pub id: String,
    pub organizador_id: String,
    pub plano_id: String,
    pub status: String,
    pub expira_em: Option<String>,
    pub created_at: String,
    pub plano: Option<PlanRow>,
}

pub struct TestimonialRow {
    pub id: String,
    pub organizador_id: Option<String>,
    pub nome: String,
    pub foto_url: Option<String>,
    pub estrelas: i64,
    pub texto: String,
    pub aprovado: bool,
    pub created_at: String,
}

pub struct ConfigRow {
    pub id: String,
    pub conteudo: String,
    pub updated_at: String,
}
