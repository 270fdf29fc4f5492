use super::{EntityDef, FieldDef, RequiredWhen};

pub const ROLES: &[&str] = &["Asistente", "Abogado", "Administrador"];
pub const TIPOS_PERSONA: &[&str] = &["Jurídica", "Natural"];
pub const TIPOS_DOCUMENTO: &[&str] = &["Pasaporte", "RUC", "DNI"];
pub const ESTADOS_CLIENTE: &[&str] = &["Activo", "Inactivo"];
pub const ESTADOS_CASO: &[&str] = &["Abierto", "En Proceso", "Cerrado"];
pub const CATEGORIAS_DOCUMENTO: &[&str] =
    &["General", "Contrato", "Sentencia", "Resolución", "Evidencia", "Otro"];
pub const TIPOS_REPORTE: &[&str] = &["General", "Calendario", "Documentos", "Clientes", "Casos"];
pub const TIPOS_EVENTO: &[&str] = &["Otro", "Entrega", "Plazo", "Reunión", "Audiencia"];
pub const RECURRENCIAS: &[&str] = &["Anual", "Mensual", "Semanal", "Diario", "No"];

pub static MATERIAS_CASOS: EntityDef = EntityDef {
    table: "materias_casos",
    label: "materia",
    fields: &[
        FieldDef::text("nombre", 100).required().searchable(),
        FieldDef::long_text("descripcion"),
    ],
    timestamp: None,
    immutable: false,
    rules: &[],
};

pub static TIPOS_CASOS: EntityDef = EntityDef {
    table: "tipos_casos",
    label: "tipo de caso",
    fields: &[
        FieldDef::integer("materia_id").required(),
        FieldDef::text("nombre", 100).required().searchable(),
        FieldDef::long_text("descripcion"),
    ],
    timestamp: None,
    immutable: false,
    rules: &[],
};

pub static ETAPAS_PROCESALES: EntityDef = EntityDef {
    table: "etapas_procesales",
    label: "etapa procesal",
    fields: &[
        FieldDef::integer("tipo_caso_id"),
        FieldDef::text("nombre", 100).required().searchable(),
        FieldDef::long_text("descripcion"),
        // Column default is 1
        FieldDef::integer("orden"),
    ],
    timestamp: None,
    immutable: false,
    rules: &[],
};

pub static USUARIOS: EntityDef = EntityDef {
    table: "usuarios",
    label: "usuario",
    fields: &[
        FieldDef::text("nombres", 100).encrypted().required().searchable(),
        FieldDef::text("apellidos", 100).encrypted().required().searchable(),
        FieldDef::email("correo", 150).lookup().required(),
        FieldDef::password("password", 8).required(),
        FieldDef::one_of("rol", ROLES).default_value("Asistente"),
    ],
    timestamp: Some("creado_en"),
    immutable: false,
    rules: &[],
};

pub static CLIENTES: EntityDef = EntityDef {
    table: "clientes",
    label: "cliente",
    fields: &[
        FieldDef::one_of("tipo_persona", TIPOS_PERSONA).required(),
        FieldDef::one_of("tipo_documento", TIPOS_DOCUMENTO).required(),
        FieldDef::text("numero_documento", 20).lookup().required(),
        FieldDef::text("nombres", 100).encrypted().searchable(),
        FieldDef::text("apellidos", 100).encrypted().searchable(),
        FieldDef::text("razon_social", 150).encrypted().searchable(),
        FieldDef::text("representante_legal", 150).encrypted(),
        FieldDef::text("telefono", 20).encrypted(),
        FieldDef::email("correo", 150).encrypted(),
        FieldDef::text("direccion", 255).encrypted(),
        FieldDef::one_of("estado", ESTADOS_CLIENTE).default_value("Activo"),
    ],
    timestamp: Some("creado_en"),
    immutable: false,
    rules: &[
        RequiredWhen {
            field: "tipo_persona",
            equals: "Natural",
            requires: &["nombres", "apellidos"],
            message: "required for a natural person",
        },
        RequiredWhen {
            field: "tipo_persona",
            equals: "Jurídica",
            requires: &["razon_social"],
            message: "required for a legal entity",
        },
    ],
};

pub static CASOS: EntityDef = EntityDef {
    table: "casos",
    label: "caso",
    fields: &[
        FieldDef::text("codigo_caso", 50).required().unique(),
        FieldDef::text("expediente_completo", 30).required().unique(),
        FieldDef::text("secuencia", 5).required(),
        FieldDef::text("anio", 4).required(),
        FieldDef::text("indicador_fuero", 1).required(),
        FieldDef::text("codigo_organo", 4).required(),
        FieldDef::text("tipo_organo", 2).required(),
        FieldDef::text("especialidad", 2).required(),
        FieldDef::text("distrito", 2).required(),
        FieldDef::text("titulo", 255).required().searchable(),
        FieldDef::long_text("descripcion").encrypted().searchable(),
        FieldDef::integer("materia_id").required(),
        FieldDef::integer("tipo_caso_id"),
        FieldDef::one_of("estado", ESTADOS_CASO).default_value("Abierto"),
        FieldDef::date("fecha_inicio"),
        FieldDef::date("fecha_cierre"),
        FieldDef::integer("cliente_id").required(),
        FieldDef::integer("abogado_id").required(),
        FieldDef::text("contraparte", 255).encrypted().searchable(),
    ],
    timestamp: None,
    immutable: false,
    rules: &[],
};

pub static DOCUMENTOS: EntityDef = EntityDef {
    table: "documentos",
    label: "documento",
    fields: &[
        FieldDef::text("nombre_archivo", 255).required().searchable(),
        FieldDef::text("tipo_archivo", 50),
        FieldDef::text("ruta", 255).encrypted().required(),
        FieldDef::long_text("descripcion").encrypted().searchable(),
        FieldDef::text("expediente", 30),
        FieldDef::integer("subido_por").required(),
        FieldDef::integer("caso_id"),
        FieldDef::integer("cliente_id"),
        FieldDef::one_of("categoria", CATEGORIAS_DOCUMENTO).default_value("General"),
    ],
    timestamp: Some("fecha_subida"),
    immutable: false,
    rules: &[],
};

pub static CALENDARIO: EntityDef = EntityDef {
    table: "calendario",
    label: "evento",
    fields: &[
        FieldDef::text("titulo", 255).required().searchable(),
        FieldDef::long_text("descripcion").encrypted().searchable(),
        FieldDef::datetime("fecha_inicio").required(),
        FieldDef::datetime("fecha_fin"),
        FieldDef::text("tipo_evento", 50).default_value("Otro"),
        FieldDef::text("estado", 50).default_value("Pendiente"),
        FieldDef::text("color", 20).default_value("#2b7bba"),
        FieldDef::integer("caso_id"),
        FieldDef::integer("etapa_id"),
        FieldDef::integer("abogado_id"),
        FieldDef::integer("cliente_id"),
        FieldDef::integer("creado_por"),
    ],
    timestamp: Some("creado_en"),
    immutable: false,
    rules: &[],
};

pub static COMENTARIOS_CASOS: EntityDef = EntityDef {
    table: "comentarios_casos",
    label: "comentario",
    fields: &[
        FieldDef::integer("caso_id").required(),
        FieldDef::integer("usuario_id").required(),
        FieldDef::long_text("comentario").encrypted().required().searchable(),
    ],
    timestamp: Some("fecha"),
    immutable: false,
    rules: &[],
};

pub static BITACORA: EntityDef = EntityDef {
    table: "bitacora",
    label: "registro de bitácora",
    fields: &[
        FieldDef::integer("usuario_id"),
        FieldDef::text("accion", 255).encrypted().searchable(),
        FieldDef::text("ip", 50).encrypted(),
    ],
    timestamp: Some("fecha"),
    immutable: true,
    rules: &[],
};

pub static REPORTES: EntityDef = EntityDef {
    table: "reportes",
    label: "reporte",
    fields: &[
        FieldDef::text("titulo", 150).required().searchable(),
        FieldDef::one_of("tipo_reporte", TIPOS_REPORTE).required(),
        FieldDef::long_text("descripcion").encrypted().searchable(),
        FieldDef::json("parametros").encrypted(),
        FieldDef::integer("generado_por").required(),
    ],
    timestamp: Some("fecha_generacion"),
    immutable: false,
    rules: &[],
};

pub static EVENTOS: EntityDef = EntityDef {
    table: "eventos",
    label: "evento de agenda",
    fields: &[
        FieldDef::text("titulo", 255).required().searchable(),
        FieldDef::long_text("descripcion").encrypted().searchable(),
        FieldDef::datetime("fecha_inicio").required(),
        FieldDef::datetime("fecha_fin"),
        FieldDef::text("ubicacion", 255),
        FieldDef::text("color", 20).default_value("#3486bc"),
        FieldDef::one_of("tipo_evento", TIPOS_EVENTO).default_value("Otro"),
        FieldDef::one_of("recurrente", RECURRENCIAS).default_value("No"),
        FieldDef::integer("caso_id"),
        FieldDef::integer("etapa_id"),
        FieldDef::text("expediente", 30),
        FieldDef::integer("creado_por").required(),
    ],
    timestamp: Some("creado_en"),
    immutable: false,
    rules: &[],
};

/// Every entity exposed by the API, in migration order.
pub static ALL: &[&EntityDef] = &[
    &MATERIAS_CASOS,
    &TIPOS_CASOS,
    &ETAPAS_PROCESALES,
    &USUARIOS,
    &CLIENTES,
    &CASOS,
    &DOCUMENTOS,
    &CALENDARIO,
    &EVENTOS,
    &COMENTARIOS_CASOS,
    &BITACORA,
    &REPORTES,
];

/// Resolve an entity by table name. Hyphenated route names are accepted.
pub fn lookup(name: &str) -> Option<&'static EntityDef> {
    let normalized = name.replace('-', "_");
    ALL.iter().copied().find(|def| def.table == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_route_names() {
        assert_eq!(lookup("usuarios").map(|d| d.table), Some("usuarios"));
        assert_eq!(lookup("comentarios-casos").map(|d| d.table), Some("comentarios_casos"));
        assert!(lookup("facturas").is_none());
    }

    #[test]
    fn only_the_audit_log_is_immutable() {
        let immutable: Vec<_> = ALL.iter().filter(|d| d.immutable).map(|d| d.table).collect();
        assert_eq!(immutable, vec!["bitacora"]);
    }

    #[test]
    fn reference_catalogs_carry_no_encrypted_fields() {
        for def in [&MATERIAS_CASOS, &TIPOS_CASOS, &ETAPAS_PROCESALES] {
            assert_eq!(def.encrypted_fields().count(), 0, "{}", def.table);
        }
        assert_eq!(lookup("etapas-procesales").map(|d| d.label), Some("etapa procesal"));
    }

    #[test]
    fn event_descriptions_are_encrypted_and_searchable() {
        let descripcion = EVENTOS.field("descripcion").unwrap();
        assert!(descripcion.is_encrypted());
        assert!(descripcion.searchable);
        assert!(!descripcion.has_lookup_hash());
    }

    #[test]
    fn passwords_are_secret_not_encrypted() {
        let password = USUARIOS.field("password").unwrap();
        assert!(password.is_secret());
        assert!(!password.is_encrypted());
    }
}
