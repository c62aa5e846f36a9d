//! 接口目录
//!
//! 每个接口是一个实现了 [`ApiRequest`] 的类型：路径模板、方法、响应类型都是
//! 编译期常量，请求管道据此完成路径参数替换、查询串拼接和鉴权判断。

use crate::{
    AssistantInfo, ChangePasswordParams, DeptInfo, DictDataInfo, DictTypeInfo, Extra,
    KnowledgeBaseDocumentInfo, KnowledgeBaseInfo, ListQuery, MenuInfo, PageResult, RefreshTokenParams, RoleInfo,
    SessionToken, SignInParams, SignUpParams, UserInfo,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

// =========================================================
// 常量定义
// =========================================================

pub const SIGN_IN_PATH: &str = "/api/auth/authentication/sign-in";
pub const SIGN_UP_PATH: &str = "/api/auth/authentication/sign-up";
pub const REFRESH_TOKEN_PATH: &str = "/api/auth/authentication/refresh-token";

/// 不携带 Bearer 令牌的接口（按前缀匹配路径模板）
pub const UNPROTECTED_PATHS: [&str; 3] = [REFRESH_TOKEN_PATH, SIGN_IN_PATH, SIGN_UP_PATH];

pub fn is_unprotected(schema_path: &str) -> bool {
    UNPROTECTED_PATHS
        .iter()
        .any(|prefix| schema_path.starts_with(prefix))
}

// =========================================================
// 基础类型
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// 该方法的请求是否携带 JSON 请求体
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

/// 响应解析方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// JSON 响应，成功时做时间字段格式化
    #[default]
    Json,
    /// 原始字节流（文件下载、长时间补全），不做任何后处理
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharedError {
    #[error("missing path parameter `{name}` for `{template}`")]
    MissingPathParam { name: String, template: String },
    #[error("unterminated placeholder in `{0}`")]
    MalformedTemplate(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// 接口定义：请求与响应的对应关系及元数据
pub trait ApiRequest: Serialize {
    /// 响应类型
    type Response: DeserializeOwned;
    /// 路径模板，占位符形如 `{id}`
    const PATH: &'static str;
    const METHOD: HttpMethod;
    const MODE: ResponseMode = ResponseMode::Json;

    /// 路径参数
    fn path_params(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// 查询参数，默认把 GET/DELETE 请求自身序列化为查询串
    fn query(&self) -> Result<Vec<(String, String)>, SharedError> {
        if Self::METHOD.has_body() {
            return Ok(Vec::new());
        }
        let value = serde_json::to_value(self).map_err(|e| SharedError::Encode(e.to_string()))?;
        Ok(query_pairs(&value))
    }

    /// 请求体，默认把 POST/PUT/PATCH 请求自身序列化为 JSON
    fn body(&self) -> Result<Option<Value>, SharedError> {
        if !Self::METHOD.has_body() {
            return Ok(None);
        }
        serde_json::to_value(self)
            .map(Some)
            .map_err(|e| SharedError::Encode(e.to_string()))
    }

    /// 额外请求头
    fn headers(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// 替换路径模板中的 `{name}` 占位符，参数值做 URL 编码
pub fn expand_path(template: &str, params: &[(&str, String)]) -> Result<String, SharedError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| SharedError::MalformedTemplate(template.to_string()))?;
        let name = &after[..end];
        let value = params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| SharedError::MissingPathParam {
                name: name.to_string(),
                template: template.to_string(),
            })?;
        out.push_str(&urlencoding::encode(value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// 把扁平 JSON 对象转为查询参数对；`null` 跳过，数组展开为重复键
pub fn query_pairs(value: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =========================================================
// 认证接口
// =========================================================

impl ApiRequest for SignInParams {
    type Response = SessionToken;
    const PATH: &'static str = SIGN_IN_PATH;
    const METHOD: HttpMethod = HttpMethod::Post;

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![(crate::HEADER_REAL_IP, String::new())]
    }
}

impl ApiRequest for SignUpParams {
    type Response = Value;
    const PATH: &'static str = SIGN_UP_PATH;
    const METHOD: HttpMethod = HttpMethod::Post;
}

impl ApiRequest for RefreshTokenParams {
    type Response = SessionToken;
    const PATH: &'static str = REFRESH_TOKEN_PATH;
    const METHOD: HttpMethod = HttpMethod::Post;
}

/// 获取当前登录用户信息，后端可能返回空响应体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserInfoRequest;

impl ApiRequest for UserInfoRequest {
    type Response = Option<UserInfo>;
    const PATH: &'static str = "/api/system/user/info";
    const METHOD: HttpMethod = HttpMethod::Get;
}

/// 获取当前登录用户的权限码
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessCodesRequest;

impl ApiRequest for AccessCodesRequest {
    type Response = Vec<String>;
    const PATH: &'static str = "/api/system/user/code";
    const METHOD: HttpMethod = HttpMethod::Get;
}

impl ApiRequest for ChangePasswordParams {
    type Response = Value;
    const PATH: &'static str = "/api/system/user/changePassword";
    const METHOD: HttpMethod = HttpMethod::Patch;
}

/// 下载知识库文档（字节流）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadDocumentRequest {
    #[serde(skip)]
    pub knowledge_base_id: String,
    #[serde(skip)]
    pub document_id: String,
}

impl ApiRequest for DownloadDocumentRequest {
    type Response = Vec<u8>;
    const PATH: &'static str = "/api/knowledge-base/{id}/documents/{document_id}";
    const METHOD: HttpMethod = HttpMethod::Get;
    const MODE: ResponseMode = ResponseMode::Stream;

    fn path_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.knowledge_base_id.clone()),
            ("document_id", self.document_id.clone()),
        ]
    }
}

/// 管理端下载知识库文档（字节流）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDownloadDocumentRequest(#[serde(skip)] pub DownloadDocumentRequest);

impl ApiRequest for SystemDownloadDocumentRequest {
    type Response = Vec<u8>;
    const PATH: &'static str = "/api/system/knowledge-base/{id}/documents/{document_id}";
    const METHOD: HttpMethod = HttpMethod::Get;
    const MODE: ResponseMode = ResponseMode::Stream;

    fn path_params(&self) -> Vec<(&'static str, String)> {
        self.0.path_params()
    }
}

/// 分页列出知识库中的文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseDocumentsRequest {
    #[serde(skip)]
    pub knowledge_base_id: u64,
    #[serde(flatten)]
    pub query: ListQuery,
}

impl ApiRequest for KnowledgeBaseDocumentsRequest {
    type Response = PageResult<KnowledgeBaseDocumentInfo>;
    const PATH: &'static str = "/api/knowledge-base/{id}/documents";
    const METHOD: HttpMethod = HttpMethod::Get;

    fn path_params(&self) -> Vec<(&'static str, String)> {
        vec![("id", self.knowledge_base_id.to_string())]
    }
}

// =========================================================
// 资源 CRUD 接口
// =========================================================

/// 为一个 REST 资源生成 列表/创建/详情/更新/删除 五个接口类型
macro_rules! resource_requests {
    (
        $module:ident,
        base = $base:literal,
        item = $item:literal,
        entity = $entity:ty,
        list_response = $list_resp:ty $(,)?
    ) => {
        pub mod $module {
            use super::*;

            pub const BASE_PATH: &str = $base;

            #[derive(Debug, Clone, Default, Serialize, Deserialize)]
            pub struct List(#[serde(default)] pub ListQuery);

            impl ApiRequest for List {
                type Response = $list_resp;
                const PATH: &'static str = $base;
                const METHOD: HttpMethod = HttpMethod::Get;
            }

            #[derive(Debug, Clone, Default, Serialize, Deserialize)]
            pub struct Create(pub Extra);

            impl ApiRequest for Create {
                type Response = $entity;
                const PATH: &'static str = $base;
                const METHOD: HttpMethod = HttpMethod::Post;
            }

            #[derive(Debug, Clone, Serialize, Deserialize)]
            pub struct Detail {
                #[serde(skip)]
                pub id: u64,
            }

            impl ApiRequest for Detail {
                type Response = $entity;
                const PATH: &'static str = $item;
                const METHOD: HttpMethod = HttpMethod::Get;

                fn path_params(&self) -> Vec<(&'static str, String)> {
                    vec![("id", self.id.to_string())]
                }
            }

            /// 更新请求，`id` 只出现在路径中，`body` 作为请求体原样发送
            #[derive(Debug, Clone, Serialize, Deserialize)]
            pub struct Update {
                #[serde(skip)]
                pub id: u64,
                #[serde(flatten)]
                pub body: Extra,
            }

            impl ApiRequest for Update {
                type Response = $entity;
                const PATH: &'static str = $item;
                const METHOD: HttpMethod = HttpMethod::Patch;

                fn path_params(&self) -> Vec<(&'static str, String)> {
                    vec![("id", self.id.to_string())]
                }
            }

            #[derive(Debug, Clone, Serialize, Deserialize)]
            pub struct Delete {
                #[serde(skip)]
                pub id: u64,
            }

            impl ApiRequest for Delete {
                type Response = Value;
                const PATH: &'static str = $item;
                const METHOD: HttpMethod = HttpMethod::Delete;

                fn path_params(&self) -> Vec<(&'static str, String)> {
                    vec![("id", self.id.to_string())]
                }
            }
        }
    };
}

resource_requests!(
    user,
    base = "/api/system/user",
    item = "/api/system/user/{id}",
    entity = UserInfo,
    list_response = PageResult<UserInfo>,
);

resource_requests!(
    role,
    base = "/api/system/role",
    item = "/api/system/role/{id}",
    entity = RoleInfo,
    list_response = PageResult<RoleInfo>,
);

resource_requests!(
    dept,
    base = "/api/system/dept",
    item = "/api/system/dept/{id}",
    entity = DeptInfo,
    list_response = Vec<DeptInfo>,
);

resource_requests!(
    menu,
    base = "/api/system/menu",
    item = "/api/system/menu/{id}",
    entity = MenuInfo,
    list_response = Vec<MenuInfo>,
);

resource_requests!(
    dict_type,
    base = "/api/system/dict-type",
    item = "/api/system/dict-type/{id}",
    entity = DictTypeInfo,
    list_response = PageResult<DictTypeInfo>,
);

resource_requests!(
    dict_data,
    base = "/api/system/dict-data",
    item = "/api/system/dict-data/{id}",
    entity = DictDataInfo,
    list_response = PageResult<DictDataInfo>,
);

resource_requests!(
    system_knowledge_base,
    base = "/api/system/knowledge-base",
    item = "/api/system/knowledge-base/{id}",
    entity = KnowledgeBaseInfo,
    list_response = PageResult<KnowledgeBaseInfo>,
);

resource_requests!(
    knowledge_base,
    base = "/api/knowledge-base",
    item = "/api/knowledge-base/{id}",
    entity = KnowledgeBaseInfo,
    list_response = PageResult<KnowledgeBaseInfo>,
);

resource_requests!(
    assistant,
    base = "/api/assistant",
    item = "/api/assistant/{id}",
    entity = AssistantInfo,
    list_response = PageResult<AssistantInfo>,
);
