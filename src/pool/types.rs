//! Tipos de dados trocados com o serviço de user-pool.
//!
//! O serviço devolve contas de teste em JSON (camelCase). [`ReservedIdentity`]
//! espelha esse formato; as credenciais são opacas para este crate e nunca
//! são validadas aqui.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Plataforma de streaming à qual uma conta de teste pertence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitch,
    Youtube,
    Mixer,
    Facebook,
}

impl Platform {
    /// Nome usado no caminho da URL e no campo `type` do JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Youtube => "youtube",
            Platform::Mixer => "mixer",
            Platform::Facebook => "facebook",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacidades opcionais conhecidas de uma conta do pool.
///
/// Filtros também aceitam nomes arbitrários; este enum só evita erros de
/// digitação nos nomes que o serviço já conhece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Streaming desabilitado para a conta do YouTube.
    StreamingIsDisabled,
    /// A conta não tem páginas do Facebook.
    NoFacebookPages,
    /// A conta tem um Twitter vinculado.
    HasLinkedTwitter,
    /// Autenticação em dois fatores desabilitada na Twitch.
    TwoFactorDisabled,
    /// A conta tem várias plataformas habilitadas.
    Multistream,
    /// Conta Prime.
    Prime,
    /// Streaming indisponível. O pool só devolve essas contas se o filtro
    /// pedir explicitamente `notStreamable = true`.
    NotStreamable,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::StreamingIsDisabled => "streamingIsDisabled",
            Feature::NoFacebookPages => "noFacebookPages",
            Feature::HasLinkedTwitter => "hasLinkedTwitter",
            Feature::TwoFactorDisabled => "2FADisabled",
            Feature::Multistream => "multistream",
            Feature::Prime => "prime",
            Feature::NotStreamable => "notStreamable",
        }
    }
}

/// Filtro de capacidades enviado no parâmetro `filter` da reserva.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFilter(BTreeMap<String, bool>);

impl FeatureFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define o valor desejado de uma capacidade pelo nome.
    pub fn set(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.0.insert(name.into(), enabled);
        self
    }

    /// Exige que a conta tenha a capacidade.
    pub fn require(self, feature: Feature) -> Self {
        self.set(feature.as_str(), true)
    }

    /// Exige que a conta não tenha a capacidade.
    pub fn exclude(self, feature: Feature) -> Self {
        self.set(feature.as_str(), false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    /// Serializa o filtro como o serviço espera (sintaxe de filtro do MongoDB).
    ///
    /// `true` é enviado como `true` e `false` como `null`: o banco do pool
    /// registra capacidades como presentes ou ausentes, nunca como `false`.
    pub fn to_query_json(&self) -> String {
        let map: serde_json::Map<String, Value> = self
            .0
            .iter()
            .map(|(name, &enabled)| {
                let value = if enabled { Value::Bool(true) } else { Value::Null };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map).to_string()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for FeatureFilter {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, enabled)| (name.into(), enabled)).collect())
    }
}

/// Uma única tentativa de reserva: `GET /reserve[/<platform>]?filter=..&isLastCall=true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReserveQuery {
    pub platform: Option<Platform>,
    pub filter: Option<FeatureFilter>,
    /// Marca a última tentativa antes de desistir; o pool pode relaxar o filtro.
    pub is_last_call: bool,
}

impl ReserveQuery {
    pub fn path_segments(&self) -> Vec<&'static str> {
        let mut segments = vec!["reserve"];
        if let Some(platform) = self.platform {
            segments.push(platform.as_str());
        }
        segments
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.to_query_json()));
        }
        if self.is_last_call {
            pairs.push(("isLastCall", "true".to_string()));
        }
        pairs
    }
}

/// Credenciais de uma conta reservada. Opacas: nunca interpretadas aqui.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Credentials {
    /// Nome de usuário na plataforma (o Mixer usa como id nas chamadas de API).
    pub username: String,
    /// Id do usuário na plataforma.
    pub id: String,
    /// Token da plataforma.
    pub token: String,
    /// Token da API Streamlabs.
    pub api_token: String,
    /// Token usado para exibir widgets.
    pub widget_token: String,
    /// Apenas Mixer e Facebook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Chave de streaming válida (Twitch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("api_token", &"<redacted>")
            .field("widget_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("stream_key", &self.stream_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Conta de teste reservada no pool.
///
/// Não implementa `Clone`: a sessão é dona da conta e a liberação a consome,
/// então as credenciais não podem ser reutilizadas depois de liberadas.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedIdentity {
    pub email: String,
    #[serde(rename = "type")]
    pub platform: Platform,
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Capacidades da conta; `null` e ausente significam "não tem".
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub features: BTreeMap<String, Option<bool>>,
    /// Worker que está usando a conta (preenchido pelo serviço).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// Momento da última requisição para esta conta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl ReservedIdentity {
    pub fn has_feature(&self, name: &str) -> bool {
        matches!(self.features.get(name), Some(Some(true)))
    }

    /// Monta o payload de login que o canal de autenticação de teste do app consome.
    pub fn user_auth(&self) -> UserAuth {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            self.platform,
            PlatformAuth {
                username: self.credentials.username.clone(),
                platform: self.platform,
                id: self.credentials.id.clone(),
                token: self.credentials.token.clone(),
                channel_id: self.credentials.channel_id.clone(),
            },
        );
        UserAuth {
            widget_token: self.credentials.widget_token.clone(),
            api_token: self.credentials.api_token.clone(),
            primary_platform: self.platform,
            platforms,
        }
    }
}

/// Payload de login entregue ao aplicativo desktop.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAuth {
    pub widget_token: String,
    pub api_token: String,
    pub primary_platform: Platform,
    pub platforms: BTreeMap<Platform, PlatformAuth>,
}

/// Dados de autenticação de uma única plataforma dentro de [`UserAuth`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformAuth {
    pub username: String,
    #[serde(rename = "type")]
    pub platform: Platform,
    pub id: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}
