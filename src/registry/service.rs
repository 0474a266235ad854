//! サービス定義と注入済みサービスの集合

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// 型消去されたサービスインスタンス
pub type ServiceRef = Arc<dyn Any + Send + Sync>;

/// 型名から既定のサービス名を生成（最後のパス要素を小文字化）
pub fn default_service_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::")
        .next()
        .unwrap_or(base)
        .to_lowercase()
}

fn downcast<T: Any + Send + Sync>(service: &ServiceRef) -> Option<Arc<T>> {
    Arc::clone(service).downcast::<T>().ok()
}

/// ハンドラーが要求するサービス
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dependencies {
    /// サービスを要求しない
    #[default]
    None,
    /// 名前を指定して要求する
    Named(Vec<String>),
    /// スコープ内の全サービスを受け取る
    All,
}

impl Dependencies {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            Dependencies::None
        } else {
            Dependencies::Named(names)
        }
    }

    /// 指定した名前のサービスを受け取るかどうか
    pub fn wants(&self, name: &str) -> bool {
        match self {
            Dependencies::None => false,
            Dependencies::Named(names) => names.iter().any(|n| n == name),
            Dependencies::All => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Dependencies::None)
    }

    /// 二つの要求を合成
    pub fn and(self, other: Dependencies) -> Dependencies {
        match (self, other) {
            (Dependencies::All, _) | (_, Dependencies::All) => Dependencies::All,
            (Dependencies::None, deps) | (deps, Dependencies::None) => deps,
            (Dependencies::Named(mut a), Dependencies::Named(b)) => {
                for name in b {
                    if !a.contains(&name) {
                        a.push(name);
                    }
                }
                Dependencies::Named(a)
            }
        }
    }
}

/// ハンドラーに渡される注入済みサービスの集合
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<String, ServiceRef>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// 型を指定してサービスを取得
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).and_then(downcast::<T>)
    }

    /// 型消去されたままサービスを取得
    pub fn get_ref(&self, name: &str) -> Option<&ServiceRef> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// サービスを追加（同名は上書き）
    pub fn insert(&mut self, name: impl Into<String>, service: ServiceRef) {
        self.entries.insert(name.into(), service);
    }

    /// 別の集合を上書きでマージ
    pub fn extend(&mut self, other: &Services) {
        for (name, service) in &other.entries {
            self.entries.insert(name.clone(), Arc::clone(service));
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("Services").field("names", &names).finish()
    }
}

/// サービス自身の依存先（後から登録されたものも反映される）
#[derive(Clone, Default)]
pub struct ServiceDeps {
    slots: Arc<RwLock<HashMap<String, ServiceRef>>>,
}

impl ServiceDeps {
    /// 依存サービスを型を指定して取得
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.slots.read().get(name).and_then(downcast::<T>)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    pub(crate) fn fill(&self, name: &str, service: ServiceRef) {
        self.slots.write().insert(name.to_string(), service);
    }
}

impl fmt::Debug for ServiceDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut names: Vec<&String> = slots.keys().collect();
        names.sort();
        f.debug_struct("ServiceDeps").field("filled", &names).finish()
    }
}

type Factory = Box<dyn FnOnce(&ServiceDeps) -> ServiceRef + Send>;

pub(crate) enum Source {
    Instance(ServiceRef),
    Factory(Factory),
}

impl Source {
    pub(crate) fn build(self, deps: &ServiceDeps) -> ServiceRef {
        match self {
            Source::Instance(instance) => instance,
            Source::Factory(factory) => factory(deps),
        }
    }
}

/// 登録するサービスの定義
pub struct ServiceDef {
    pub(crate) name: String,
    pub(crate) requires: Vec<String>,
    pub(crate) uses: Vec<String>,
    pub(crate) source: Source,
}

impl ServiceDef {
    /// 既存のインスタンスを登録
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// 共有済みのインスタンスを登録
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::with_source(default_service_name::<T>(), Source::Instance(value))
    }

    /// Defaultで構築する型を登録
    pub fn of<T: Default + Any + Send + Sync>() -> Self {
        Self::factory(|_: &ServiceDeps| T::default())
    }

    /// 依存サービスを受け取るファクトリーを登録
    ///
    /// ファクトリーはレジストリの書き込みロック中に呼ばれるため、
    /// 内部から同じレジストリへ登録してはならない。
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(&ServiceDeps) -> T + Send + 'static,
    {
        let source = Source::Factory(Box::new(move |deps: &ServiceDeps| {
            Arc::new(factory(deps)) as ServiceRef
        }));
        Self::with_source(default_service_name::<T>(), source)
    }

    fn with_source(name: String, source: Source) -> Self {
        Self {
            name,
            requires: Vec::new(),
            uses: Vec::new(),
            source,
        }
    }

    /// 明示的な名前を設定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 登録時点で同じスコープに存在しなければならない依存先
    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    /// 後から登録されても反映される依存先
    pub fn uses(mut self, name: impl Into<String>) -> Self {
        self.uses.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ServiceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDef")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("uses", &self.uses)
            .finish()
    }
}
