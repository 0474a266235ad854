//! スコープ付き依存性注入レジストリ

pub mod service;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;

use crate::common::{Handler, Invocation};
use crate::error::Error;
use crate::handler::DispatchResult;
use crate::routing::RouterId;

pub use service::{default_service_name, Dependencies, ServiceDef, ServiceDeps, ServiceRef, Services};

/// サービスの名前空間
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// アプリケーション全体
    App,
    /// ハンドラー単位の注入（プロセス内で一つ）
    Func,
    /// ルーター単位
    Router(RouterId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::App => f.write_str("app"),
            Scope::Func => f.write_str("func"),
            Scope::Router(id) => write!(f, "router:{}", id),
        }
    }
}

struct Entry {
    instance: ServiceRef,
    deps: ServiceDeps,
    uses: Vec<String>,
}

/// スコープごとにサービスを保持するレジストリ
#[derive(Default)]
pub struct Registry {
    scopes: RwLock<HashMap<Scope, HashMap<String, Entry>>>,
}

impl Registry {
    /// 新しい空のRegistryを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// サービスを登録し、インスタンスと解決済みの名前を返す
    ///
    /// 同じスコープに同名のサービスがあれば新たに構築せず既存のものを返す。
    pub fn register(&self, scope: Scope, def: ServiceDef) -> Result<(ServiceRef, String), Error> {
        let ServiceDef {
            name,
            requires,
            uses,
            source,
        } = def;

        let mut scopes = self.scopes.write();
        let services = scopes.entry(scope).or_default();

        if let Some(existing) = services.get(&name) {
            debug!("Service '{}' already registered in {} scope", name, scope);
            return Ok((Arc::clone(&existing.instance), name));
        }

        let deps = ServiceDeps::default();
        for dependency in &requires {
            match services.get(dependency) {
                Some(entry) => deps.fill(dependency, Arc::clone(&entry.instance)),
                None => {
                    return Err(Error::MissingDependency {
                        service: name,
                        dependency: dependency.clone(),
                    })
                }
            }
        }
        for dependency in &uses {
            if let Some(entry) = services.get(dependency) {
                deps.fill(dependency, Arc::clone(&entry.instance));
            }
        }

        let instance = source.build(&deps);

        // 既存サービスのうち、この名前を待っているものへ反映
        for (other, entry) in services.iter() {
            if entry.uses.iter().any(|u| u == &name) {
                debug!("Back-filling '{}' into service '{}'", name, other);
                entry.deps.fill(&name, Arc::clone(&instance));
            }
        }

        let mut uses = uses;
        uses.extend(requires);
        services.insert(
            name.clone(),
            Entry {
                instance: Arc::clone(&instance),
                deps,
                uses,
            },
        );
        info!("Registered service '{}' in {} scope", name, scope);

        Ok((instance, name))
    }

    /// 複数のサービスを順に登録
    pub fn register_all<I>(&self, scope: Scope, defs: I) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = ServiceDef>,
    {
        defs.into_iter()
            .map(|def| self.register(scope, def).map(|(_, name)| name))
            .collect()
    }

    /// スコープ内の全サービスを取得
    pub fn resolve(&self, scope: Scope) -> Services {
        let scopes = self.scopes.read();
        let mut resolved = Services::new();
        if let Some(services) = scopes.get(&scope) {
            for (name, entry) in services {
                resolved.insert(name.clone(), Arc::clone(&entry.instance));
            }
        }
        resolved
    }

    /// ハンドラーが要求するサービスを注入したハンドラーを返す
    ///
    /// 何も要求しないハンドラー、または該当するサービスが無い場合はそのまま返す。
    pub fn decorate(&self, handler: Arc<dyn Handler>, scope: Scope) -> Arc<dyn Handler> {
        let wanted = handler.dependencies();
        if wanted.is_empty() {
            return handler;
        }

        let mut services = Services::new();
        {
            let scopes = self.scopes.read();
            if let Some(entries) = scopes.get(&scope) {
                for (name, entry) in entries {
                    if wanted.wants(name) {
                        services.insert(name.clone(), Arc::clone(&entry.instance));
                    }
                }
            }
        }

        if services.is_empty() {
            return handler;
        }
        debug!("Injecting {:?} from {} scope", services, scope);
        Arc::new(Injected {
            inner: handler,
            services,
        })
    }

    /// Funcスコープに登録してからハンドラーを装飾する
    pub fn inject(&self, def: ServiceDef, handler: Arc<dyn Handler>) -> Result<Arc<dyn Handler>, Error> {
        self.register(Scope::Func, def)?;
        Ok(self.decorate(handler, Scope::Func))
    }

    /// スコープ内のサービス数
    pub fn len(&self, scope: Scope) -> usize {
        self.scopes.read().get(&scope).map_or(0, HashMap::len)
    }

    pub fn contains(&self, scope: Scope, name: &str) -> bool {
        self.scopes
            .read()
            .get(&scope)
            .map_or(false, |services| services.contains_key(name))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes = self.scopes.read();
        let mut map = f.debug_map();
        for (scope, services) in scopes.iter() {
            let mut names: Vec<&String> = services.keys().collect();
            names.sort();
            map.entry(&scope.to_string(), &names);
        }
        map.finish()
    }
}

/// サービスを注入するハンドラーラッパー
struct Injected {
    inner: Arc<dyn Handler>,
    services: Services,
}

#[async_trait]
impl Handler for Injected {
    async fn handle(&self, mut call: Invocation) -> Result<DispatchResult, Error> {
        call.services.extend(&self.services);
        self.inner.handle(call).await
    }

    fn dependencies(&self) -> Dependencies {
        self.inner.dependencies()
    }
}
