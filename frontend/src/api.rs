use crate::error::Result;
use crate::http::{HttpTransport, RequestPipeline};
use adminkit_shared::protocol::{
    AccessCodesRequest, DownloadDocumentRequest, KnowledgeBaseDocumentsRequest,
    SystemDownloadDocumentRequest, UserInfoRequest, assistant, dept, dict_data, dict_type,
    knowledge_base, menu, role, system_knowledge_base, user,
};
use adminkit_shared::{
    AssistantInfo, ChangePasswordParams, DeptInfo, DictDataInfo, DictTypeInfo, Extra,
    KnowledgeBaseDocumentInfo, KnowledgeBaseInfo, ListQuery, MenuInfo, PageResult, RoleInfo,
    SignUpParams, UserInfo,
};
use serde_json::Value;

/// 控制台接口客户端
///
/// 每个方法对应一个后端接口，请求统一经过 [`RequestPipeline`]。
pub struct ConsoleApi<T> {
    pipeline: RequestPipeline<T>,
}

impl<T> Clone for ConsoleApi<T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}

/// 为一个资源生成 list/create/detail/update/delete 五个方法
macro_rules! resource_methods {
    ($module:ident, $entity:ty, $list:ty, $list_fn:ident, $create_fn:ident, $detail_fn:ident, $update_fn:ident, $delete_fn:ident) => {
        pub async fn $list_fn(&self, query: ListQuery) -> Result<$list> {
            self.pipeline.request(&$module::List(query)).await
        }

        pub async fn $create_fn(&self, body: Extra) -> Result<$entity> {
            self.pipeline.request(&$module::Create(body)).await
        }

        pub async fn $detail_fn(&self, id: u64) -> Result<$entity> {
            self.pipeline.request(&$module::Detail { id }).await
        }

        pub async fn $update_fn(&self, id: u64, body: Extra) -> Result<$entity> {
            self.pipeline.request(&$module::Update { id, body }).await
        }

        pub async fn $delete_fn(&self, id: u64) -> Result<Value> {
            self.pipeline.request(&$module::Delete { id }).await
        }
    };
}

impl<T: HttpTransport + 'static> ConsoleApi<T> {
    pub fn new(pipeline: RequestPipeline<T>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &RequestPipeline<T> {
        &self.pipeline
    }

    // =========================================================
    // 账户
    // =========================================================

    pub async fn sign_up(&self, params: &SignUpParams) -> Result<Value> {
        self.pipeline.request(params).await
    }

    pub async fn user_info(&self) -> Result<Option<UserInfo>> {
        self.pipeline.request(&UserInfoRequest).await
    }

    pub async fn access_codes(&self) -> Result<Vec<String>> {
        self.pipeline.request(&AccessCodesRequest).await
    }

    pub async fn change_password(&self, params: &ChangePasswordParams) -> Result<Value> {
        self.pipeline.request(params).await
    }

    // =========================================================
    // 系统管理
    // =========================================================

    resource_methods!(user, UserInfo, PageResult<UserInfo>,
        list_users, create_user, user_detail, update_user, delete_user);
    resource_methods!(role, RoleInfo, PageResult<RoleInfo>,
        list_roles, create_role, role_detail, update_role, delete_role);
    resource_methods!(dept, DeptInfo, Vec<DeptInfo>,
        list_depts, create_dept, dept_detail, update_dept, delete_dept);
    resource_methods!(menu, MenuInfo, Vec<MenuInfo>,
        list_menus, create_menu, menu_detail, update_menu, delete_menu);
    resource_methods!(dict_type, DictTypeInfo, PageResult<DictTypeInfo>,
        list_dict_types, create_dict_type, dict_type_detail, update_dict_type, delete_dict_type);
    resource_methods!(dict_data, DictDataInfo, PageResult<DictDataInfo>,
        list_dict_data, create_dict_data, dict_data_detail, update_dict_data, delete_dict_data);
    resource_methods!(system_knowledge_base, KnowledgeBaseInfo, PageResult<KnowledgeBaseInfo>,
        list_system_knowledge_bases, create_system_knowledge_base,
        system_knowledge_base_detail, update_system_knowledge_base,
        delete_system_knowledge_base);

    pub async fn system_download_document(
        &self,
        knowledge_base_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>> {
        let request = SystemDownloadDocumentRequest(DownloadDocumentRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            document_id: document_id.to_string(),
        });
        self.pipeline.download(&request).await
    }

    // =========================================================
    // 知识库与助手
    // =========================================================

    resource_methods!(knowledge_base, KnowledgeBaseInfo, PageResult<KnowledgeBaseInfo>,
        list_knowledge_bases, create_knowledge_base, knowledge_base_detail,
        update_knowledge_base, delete_knowledge_base);
    resource_methods!(assistant, AssistantInfo, PageResult<AssistantInfo>,
        list_assistants, create_assistant, assistant_detail, update_assistant, delete_assistant);

    pub async fn knowledge_base_documents(
        &self,
        knowledge_base_id: u64,
        query: ListQuery,
    ) -> Result<PageResult<KnowledgeBaseDocumentInfo>> {
        let request = KnowledgeBaseDocumentsRequest {
            knowledge_base_id,
            query,
        };
        self.pipeline.request(&request).await
    }

    pub async fn download_document(
        &self,
        knowledge_base_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>> {
        let request = DownloadDocumentRequest {
            knowledge_base_id: knowledge_base_id.to_string(),
            document_id: document_id.to_string(),
        };
        self.pipeline.download(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::PipelineSettings;
    use crate::http::transport::MockHttpTransport;
    use crate::notify::RecordingNotifier;
    use crate::router::{NavigationTarget, Navigator, RouteLocation};
    use crate::session::SessionStore;
    use crate::storage::MemoryStorage;
    use adminkit_shared::SessionToken;
    use adminkit_shared::date::utc;
    use adminkit_shared::protocol::HttpMethod;
    use async_trait::async_trait;
    use serde_json::json;
    use std::rc::Rc;

    struct StaticNavigator;

    #[async_trait(?Send)]
    impl Navigator for StaticNavigator {
        fn current_route(&self) -> RouteLocation {
            RouteLocation::start()
        }

        async fn push(&self, _target: NavigationTarget) -> Result<RouteLocation> {
            Ok(RouteLocation::start())
        }

        async fn replace(&self, _target: NavigationTarget) -> Result<RouteLocation> {
            Ok(RouteLocation::start())
        }
    }

    fn api() -> ConsoleApi<MockHttpTransport> {
        let session = Rc::new(SessionStore::load(Rc::new(MemoryStorage::new())));
        session.set_token(SessionToken::new("t", "r")).unwrap();
        ConsoleApi::new(RequestPipeline::new(
            MockHttpTransport::new(),
            session,
            Rc::new(RecordingNotifier::new()),
            Rc::new(StaticNavigator),
            PipelineSettings {
                base_url: "https://api.test".into(),
                login_path: "/login".into(),
                display_offset: utc(),
            },
        ))
    }

    fn transport(api: &ConsoleApi<MockHttpTransport>) -> &MockHttpTransport {
        api.pipeline().transport()
    }

    #[tokio::test]
    async fn update_sends_patch_with_body() {
        let api = api();
        transport(&api).mock_response(
            "https://api.test/api/system/role/3",
            200,
            json!({ "id": 3, "name": "Ops", "updatedAt": "2024-05-01T12:00:00Z" }),
        );

        let mut body = Extra::new();
        body.insert("name".into(), json!("Ops"));
        let role = api.update_role(3, body).await.unwrap();

        assert_eq!(role.name, "Ops");
        assert_eq!(role.updated_at.as_deref(), Some("2024-05-01 12:00:00"));
        let sent = transport(&api).sent_to("https://api.test/api/system/role/3");
        assert_eq!(sent[0].method, HttpMethod::Patch);
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"name":"Ops"}"#));
    }

    #[tokio::test]
    async fn list_passes_filters_as_query() {
        let api = api();
        transport(&api).mock_response(
            "https://api.test/api/system/dict-data?dictTypeId=4&page=1&pageSize=10",
            200,
            json!({ "list": [{ "id": 1, "dictTypeId": 4, "label": "On", "value": "1" }], "total": 1 }),
        );

        let page = api
            .list_dict_data(ListQuery::page(1, 10).with_filter("dictTypeId", 4))
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.list[0].label, "On");
    }

    #[tokio::test]
    async fn delete_uses_item_path() {
        let api = api();
        transport(&api).mock_raw("https://api.test/api/assistant/8", 200, Vec::new());

        let result = api.delete_assistant(8).await.unwrap();

        assert_eq!(result, Value::Null);
        let sent = transport(&api).sent_to("https://api.test/api/assistant/8");
        assert_eq!(sent[0].method, HttpMethod::Delete);
        assert_eq!(sent[0].body, None);
    }

    #[tokio::test]
    async fn document_list_is_paged_under_the_knowledge_base() {
        let api = api();
        transport(&api).mock_response(
            "https://api.test/api/knowledge-base/7/documents?keyword=faq&page=2&pageSize=20",
            200,
            json!({
                "list": [{ "id": 11, "name": "faq.pdf", "size": 2048, "createdAt": "2024-05-01T12:00:00Z" }],
                "total": 21
            }),
        );

        let mut query = ListQuery::page(2, 20);
        query.keyword = Some("faq".into());
        let page = api.knowledge_base_documents(7, query).await.unwrap();

        assert_eq!(page.total, 21);
        assert_eq!(page.list[0].name, "faq.pdf");
        assert_eq!(page.list[0].size, Some(2048));
        let sent = transport(&api).sent_to(
            "https://api.test/api/knowledge-base/7/documents?keyword=faq&page=2&pageSize=20",
        );
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].body, None);
    }

    #[tokio::test]
    async fn system_download_uses_system_scope() {
        let api = api();
        transport(&api).mock_raw(
            "https://api.test/api/system/knowledge-base/kb/documents/d1",
            200,
            vec![0, 159, 146, 150],
        );

        let bytes = api.system_download_document("kb", "d1").await.unwrap();

        assert_eq!(bytes, vec![0, 159, 146, 150]);
    }
}
