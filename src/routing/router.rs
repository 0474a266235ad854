//! メソッドごとのルートテーブルとサブルーター

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::common::{Handler, Method, Middleware};
use crate::error::Error;

use super::matcher::PathPattern;
use super::RouterId;

/// 登録済みのルート
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.pattern.template())
            .finish()
    }
}

/// 照合結果（ルートを所有するルーターも返す）
pub struct RouteMatch<'a> {
    pub handler: Arc<dyn Handler>,
    pub params: HashMap<String, String>,
    pub router: &'a Router,
}

/// ルートテーブル
pub struct Router {
    id: RouterId,
    prefix: String,
    routes: HashMap<Method, Vec<Route>>,
    sub_routers: Vec<(String, Router)>,
    middlewares: Vec<Arc<dyn Middleware>>,
    not_found: Option<Arc<dyn Handler>>,
}

impl Router {
    /// 新しいRouterを作成
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// 全ルートの前に付与するプレフィックス付きのRouterを作成
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let routes = Method::ALL.iter().map(|m| (*m, Vec::new())).collect();
        Self {
            id: RouterId::new(),
            prefix: prefix.into().trim_end_matches('/').to_string(),
            routes,
            sub_routers: Vec::new(),
            middlewares: Vec::new(),
            not_found: None,
        }
    }

    pub fn id(&self) -> RouterId {
        self.id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// ルートを登録（同じテンプレートは元の位置で置き換え）
    pub fn route<H>(&mut self, method: Method, template: &str, handler: H) -> Result<&mut Self, Error>
    where
        H: Handler + 'static,
    {
        let pattern = PathPattern::compile(&format!("{}{}", self.prefix, template))?;
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let routes = self.routes.entry(method).or_default();

        if let Some(existing) = routes
            .iter_mut()
            .find(|r| r.pattern.template() == pattern.template())
        {
            debug!(
                "Replacing handler for {} {}",
                method,
                pattern.template()
            );
            existing.handler = handler;
            return Ok(self);
        }

        // 開発時はinfo、本番相当ではdebugに落とす
        #[cfg(debug_assertions)]
        info!("Registering handler for {} {}", method, pattern.template());
        #[cfg(not(debug_assertions))]
        debug!("Registering handler for {} {}", method, pattern.template());

        routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    pub fn get<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::GET, template, handler)
    }

    pub fn post<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::POST, template, handler)
    }

    pub fn put<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::PUT, template, handler)
    }

    pub fn delete<H: Handler + 'static>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error> {
        self.route(Method::DELETE, template, handler)
    }

    /// サブルーターをマウント（同じプレフィックスは元の位置で置き換え）
    pub fn mount(&mut self, prefix: &str, router: Router) -> &mut Self {
        let prefix = prefix.trim_end_matches('/').to_string();
        info!("Mounting router {} at '{}'", router.id, prefix);

        match self.sub_routers.iter_mut().find(|(p, _)| *p == prefix) {
            Some(slot) => slot.1 = router,
            None => self.sub_routers.push((prefix, router)),
        }
        self
    }

    /// ルーター単位のミドルウェアを追加
    pub fn middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// 共有済みのミドルウェアをまとめて追加
    pub fn middlewares<I>(&mut self, middlewares: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.middlewares.extend(middlewares);
        self
    }

    /// 一致するルートが無い場合のハンドラーを設定
    pub fn not_found<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    pub fn middleware_list(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    /// 一致しなかったパスに使う not-found ハンドラーと、それを持つルーター
    ///
    /// `find` と同じ規則でサブルーターを辿り、最も深いハンドラーを返す。
    /// 途中のルーターが持たない場合は親のものが使われる。
    pub fn not_found_for(&self, path: &str) -> Option<(&Arc<dyn Handler>, &Router)> {
        let own = self.not_found.as_ref().map(|handler| (handler, self));
        match self.child_for(path) {
            Some((child, rest)) => child.not_found_for(rest).or(own),
            None => own,
        }
    }

    pub fn routes(&self, method: Method) -> &[Route] {
        self.routes.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    /// マウント済みのサブルーター（登録順）
    pub fn sub_routers(&self) -> impl Iterator<Item = (&str, &Router)> {
        self.sub_routers.iter().map(|(p, r)| (p.as_str(), r))
    }

    /// メソッドとパスからハンドラーを探す
    ///
    /// 自身のルートを登録順に試し、無ければプレフィックスが一致した
    /// 最初のサブルーターにだけ委譲する。
    pub fn find(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        if let Some(routes) = self.routes.get(&method) {
            for route in routes {
                if let Some(params) = route.pattern.matches(path) {
                    debug!(
                        "Matched {} {} against {}",
                        method,
                        path,
                        route.pattern.template()
                    );
                    return Some(RouteMatch {
                        handler: Arc::clone(&route.handler),
                        params,
                        router: self,
                    });
                }
            }
        }

        let (child, rest) = self.child_for(path)?;
        debug!("Delegating {} {} to sub-router {}", method, rest, child.id);
        child.find(method, rest)
    }

    /// プレフィックスが一致した最初のサブルーターと残りのパス
    fn child_for<'p>(&self, path: &'p str) -> Option<(&Router, &'p str)> {
        self.sub_routers.iter().find_map(|(prefix, child)| {
            path.strip_prefix(prefix.as_str())
                .map(|rest| (child, if rest.is_empty() { "/" } else { rest }))
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mounts: Vec<&str> = self.sub_routers.iter().map(|(p, _)| p.as_str()).collect();
        f.debug_struct("Router")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("routes", &self.routes.values().map(Vec::len).sum::<usize>())
            .field("sub_routers", &mounts)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
