//! 술어 대수 — 레코드에 대한 합성 가능한 불리언 술어
//!
//! [`Criterion`]은 `R -> Result<bool, PolicyError>` 함수의 래퍼로,
//! `and`/`or`/`not` 합성에 닫혀 있습니다. 술어는 속성 디코딩 실패로
//! 에러를 낼 수 있지만, 한쪽 가지의 실패가 다른 가지의 평가를 막지
//! 않습니다. 규칙은 이기종 레코드 타입에 대해 작성되는 일이 잦기
//! 때문입니다.
//!
//! 에러 처리 방침: `and`/`or`는 `Ok` 값에 대해서는 단락 평가하고,
//! 에러가 난 가지가 있으면 진단을 위해 반대쪽 가지도 평가한 뒤 첫
//! 에러를 전파합니다. 인터프리터는 에러를 false로 취급하므로 관찰
//! 가능한 매칭 결과는 fail-closed입니다.

use std::sync::Arc;

use crate::error::PolicyError;

/// 함수형 술어 타입
pub type Predicate<R> = Arc<dyn Fn(&R) -> Result<bool, PolicyError> + Send + Sync>;

/// 합성 가능한 술어
///
/// 컴파일이 끝난 `Criterion`은 파서 상태에 대한 참조를 갖지 않는
/// 순수한 레코드 함수입니다.
pub struct Criterion<R> {
    pred: Predicate<R>,
}

impl<R> Clone for Criterion<R> {
    fn clone(&self) -> Self {
        Self {
            pred: Arc::clone(&self.pred),
        }
    }
}

impl<R: 'static> Criterion<R> {
    /// 함수에서 술어를 생성합니다.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&R) -> Result<bool, PolicyError> + Send + Sync + 'static,
    {
        Self { pred: Arc::new(f) }
    }

    /// 항상 참인 술어
    pub fn always_true() -> Self {
        Self::new(|_| Ok(true))
    }

    /// 항상 거짓인 술어
    pub fn always_false() -> Self {
        Self::new(|_| Ok(false))
    }

    /// 술어를 평가합니다.
    pub fn eval(&self, r: &R) -> Result<bool, PolicyError> {
        (self.pred)(r)
    }

    /// 두 술어의 논리곱을 계산합니다.
    ///
    /// `Ok(false)`에서 단락 평가합니다. 왼쪽이 에러이면 진단을 위해
    /// 오른쪽도 평가한 뒤 첫 에러를 전파합니다.
    pub fn and(&self, other: &Criterion<R>) -> Criterion<R> {
        let lhs = Arc::clone(&self.pred);
        let rhs = Arc::clone(&other.pred);
        Criterion::new(move |r| match lhs(r) {
            Ok(true) => rhs(r),
            Ok(false) => Ok(false),
            Err(e) => {
                if let Err(re) = rhs(r) {
                    tracing::debug!(error = %re, "secondary branch of conjunction also failed");
                }
                Err(e)
            }
        })
    }

    /// 두 술어의 논리합을 계산합니다.
    ///
    /// `Ok(true)`에서 단락 평가합니다. 왼쪽이 에러이면 진단을 위해
    /// 오른쪽도 평가한 뒤 첫 에러를 전파합니다.
    pub fn or(&self, other: &Criterion<R>) -> Criterion<R> {
        let lhs = Arc::clone(&self.pred);
        let rhs = Arc::clone(&other.pred);
        Criterion::new(move |r| match lhs(r) {
            Ok(true) => Ok(true),
            Ok(false) => rhs(r),
            Err(e) => {
                if let Err(re) = rhs(r) {
                    tracing::debug!(error = %re, "secondary branch of disjunction also failed");
                }
                Err(e)
            }
        })
    }

    /// 술어의 부정을 계산합니다. 에러는 그대로 보존됩니다.
    pub fn not(&self) -> Criterion<R> {
        let inner = Arc::clone(&self.pred);
        Criterion::new(move |r| inner(r).map(|b| !b))
    }

    /// 술어 목록의 논리곱을 유도합니다. 빈 목록은 항상 참입니다.
    pub fn all(criteria: impl IntoIterator<Item = Criterion<R>>) -> Criterion<R> {
        criteria
            .into_iter()
            .fold(Self::always_true(), |acc, c| acc.and(&c))
    }

    /// 술어 목록의 논리합을 유도합니다. 빈 목록은 항상 거짓입니다.
    pub fn any(criteria: impl IntoIterator<Item = Criterion<R>>) -> Criterion<R> {
        criteria
            .into_iter()
            .fold(Self::always_false(), |acc, c| acc.or(&c))
    }
}
